//! Shared dispatch stubs.
//!
//! A stub is keyed on the *canonical* form of a signature: reference slots collapse to
//! `Object` and sub-word integer slots collapse to `int`, so handles whose signatures differ
//! only in those positions share one stub. Slots inside the key's stop range keep their
//! exact type, for adapters whose behaviour depends on that slot's shape.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use junction_config::{targets, ThunkCacheConfig};
use junction_signature::{field_descriptor, parse_method_descriptor, SignatureType, Type};
use parking_lot::Mutex;

use crate::error::{InvokeError, LinkError};
use crate::handle::CallTarget;
use crate::value::Value;

/// Extra discriminant for adapters whose stubs differ by more than their signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThunkExtra {
    Int(i32),
    Long(i64),
    Object(Arc<str>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThunkKey {
    canonical: Arc<str>,
    extra: Option<ThunkExtra>,
}

impl ThunkKey {
    pub fn new(signature: &SignatureType, stop: Range<usize>, extra: Option<ThunkExtra>) -> Self {
        ThunkKey {
            canonical: canonicalize(signature, stop).into(),
            extra,
        }
    }

    pub fn canonical_signature(&self) -> &str {
        &self.canonical
    }

    pub fn extra(&self) -> Option<&ThunkExtra> {
        self.extra.as_ref()
    }
}

impl fmt::Display for ThunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.extra {
            None => f.write_str(&self.canonical),
            Some(ThunkExtra::Int(value)) => write!(f, "{}#{value}", self.canonical),
            Some(ThunkExtra::Long(value)) => write!(f, "{}#{value}L", self.canonical),
            Some(ThunkExtra::Object(value)) => write!(f, "{}#{value}", self.canonical),
        }
    }
}

/// Canonical descriptor of `signature`.
///
/// Positions `0..n` are the parameters and position `n` is the return slot; positions in
/// `stop` are emitted unchanged.
pub fn canonicalize(signature: &SignatureType, stop: Range<usize>) -> String {
    let mut out = String::from("(");
    for (idx, param) in signature.parameters().iter().enumerate() {
        out.push_str(&canonical_slot(param, stop.contains(&idx)));
    }
    out.push(')');
    let ret_pos = signature.parameter_count();
    out.push_str(&canonical_slot(signature.return_type(), stop.contains(&ret_pos)));
    out
}

fn canonical_slot(ty: &Type, keep: bool) -> String {
    if keep {
        return field_descriptor(ty);
    }
    match ty {
        Type::Primitive(kind) if kind.is_subword() => field_descriptor(&Type::INT),
        Type::Primitive(_) => field_descriptor(ty),
        _ => field_descriptor(&Type::object()),
    }
}

/// Executable dispatch code for one canonical signature.
pub trait Thunk: Send + Sync + fmt::Debug {
    fn key(&self) -> &ThunkKey;

    /// Runs `target` with `args`, which already match the target's signature.
    fn enter(&self, target: &CallTarget, args: Vec<Value>) -> Result<Value, InvokeError>;
}

/// Produces stubs for canonical keys. Compilation may be slow; the cache never holds its
/// lock while compiling.
pub trait ThunkCompiler: Send + Sync {
    fn compile(&self, key: &ThunkKey) -> Result<Arc<dyn Thunk>, LinkError>;
}

/// Reference compiler: every stub checks the argument count and hands the call to the
/// target's interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter;

impl ThunkCompiler for Interpreter {
    fn compile(&self, key: &ThunkKey) -> Result<Arc<dyn Thunk>, LinkError> {
        let signature = parse_method_descriptor(key.canonical_signature()).map_err(|err| {
            LinkError::ThunkCompile {
                key: key.to_string(),
                reason: err.to_string(),
            }
        })?;
        Ok(Arc::new(InterpretedThunk {
            key: key.clone(),
            arity: signature.parameter_count(),
        }))
    }
}

#[derive(Debug)]
struct InterpretedThunk {
    key: ThunkKey,
    arity: usize,
}

impl Thunk for InterpretedThunk {
    fn key(&self) -> &ThunkKey {
        &self.key
    }

    fn enter(&self, target: &CallTarget, args: Vec<Value>) -> Result<Value, InvokeError> {
        if args.len() != self.arity {
            return Err(InvokeError::type_mismatch(
                format!("{} arguments for stub {}", self.arity, self.key),
                format!("{} arguments", args.len()),
            ));
        }
        target.interpret(args)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThunkCacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub compiles: u64,
    pub evictions: u64,
    /// Compiled stubs discarded because another thread inserted first.
    pub lost_races: u64,
}

struct CacheEntry {
    thunk: Arc<dyn Thunk>,
    last_used: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<ThunkKey, CacheEntry>,
    clock: u64,
}

impl CacheInner {
    fn touch(&mut self, key: &ThunkKey) -> Option<Arc<dyn Thunk>> {
        self.clock += 1;
        let clock = self.clock;
        let entry = self.entries.get_mut(key)?;
        entry.last_used = clock;
        Some(entry.thunk.clone())
    }

    fn evict_lru(&mut self, keep: &ThunkKey) -> Option<ThunkKey> {
        let victim = self
            .entries
            .iter()
            .filter(|(key, _)| *key != keep)
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone())?;
        self.entries.remove(&victim);
        Some(victim)
    }
}

/// Process-wide memo of compiled stubs.
///
/// Insertion is first-writer-wins: when two threads compile the same key concurrently the
/// later stub is dropped and both callers receive the stored one.
pub struct ThunkCache {
    compiler: Arc<dyn ThunkCompiler>,
    capacity: Option<usize>,
    inner: Mutex<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
    compiles: AtomicU64,
    evictions: AtomicU64,
    lost_races: AtomicU64,
}

impl ThunkCache {
    pub fn new(compiler: Arc<dyn ThunkCompiler>, config: &ThunkCacheConfig) -> Self {
        ThunkCache {
            compiler,
            capacity: config.capacity(),
            inner: Mutex::new(CacheInner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            compiles: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            lost_races: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &ThunkKey) -> Result<Arc<dyn Thunk>, LinkError> {
        if let Some(thunk) = self.inner.lock().touch(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(target: targets::THUNK, key = %key, "stub cache hit");
            return Ok(thunk);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let compiled = self.compiler.compile(key)?;
        self.compiles.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.inner.lock();
        if let Some(existing) = inner.touch(key) {
            self.lost_races.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                target: targets::THUNK,
                key = %key,
                "discarding stub compiled concurrently with an earlier insert"
            );
            return Ok(existing);
        }

        let clock = inner.clock;
        inner.entries.insert(
            key.clone(),
            CacheEntry {
                thunk: compiled.clone(),
                last_used: clock,
            },
        );
        tracing::debug!(target: targets::THUNK, key = %key, "compiled dispatch stub");

        if let Some(capacity) = self.capacity {
            while inner.entries.len() > capacity {
                let Some(victim) = inner.evict_lru(key) else {
                    break;
                };
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(target: targets::THUNK, key = %victim, "evicted dispatch stub");
            }
        }
        Ok(compiled)
    }

    pub fn get_for(
        &self,
        signature: &SignatureType,
        stop: Range<usize>,
        extra: Option<ThunkExtra>,
    ) -> Result<Arc<dyn Thunk>, LinkError> {
        self.get(&ThunkKey::new(signature, stop, extra))
    }

    pub fn contains(&self, key: &ThunkKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ThunkCacheStats {
        ThunkCacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            compiles: self.compiles.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            lost_races: self.lost_races.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for ThunkCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThunkCache")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}
