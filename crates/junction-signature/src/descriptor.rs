use crate::error::{Result, SignatureError};
use crate::signature::SignatureType;
use crate::types::{ClassName, PrimitiveKind, Type};

/// JVM limit on the dimensions of an array type.
pub const MAX_ARRAY_DIMENSIONS: usize = 255;

pub fn parse_field_descriptor(desc: &str) -> Result<Type> {
    let (ty, rest) = parse_field_type(desc)?;
    if !rest.is_empty() || ty.is_void() {
        return Err(SignatureError::InvalidDescriptor(desc.to_string()));
    }
    Ok(ty)
}

pub fn parse_method_descriptor(desc: &str) -> Result<SignatureType> {
    let Some(mut rest) = desc.strip_prefix('(') else {
        return Err(SignatureError::InvalidDescriptor(desc.to_string()));
    };

    let mut params = Vec::new();
    loop {
        if let Some(after) = rest.strip_prefix(')') {
            rest = after;
            break;
        }
        if rest.is_empty() {
            return Err(SignatureError::InvalidDescriptor(desc.to_string()));
        }
        let (param, after) = parse_field_type(rest)?;
        if param.is_void() {
            return Err(SignatureError::InvalidDescriptor(desc.to_string()));
        }
        params.push(param);
        rest = after;
    }

    if rest.is_empty() {
        return Err(SignatureError::InvalidDescriptor(desc.to_string()));
    }
    let (return_type, rest) = parse_field_type(rest)?;
    if !rest.is_empty() {
        return Err(SignatureError::InvalidDescriptor(desc.to_string()));
    }

    SignatureType::new(return_type, params)
}

/// Parses one type, including `V`; callers reject void where it is illegal.
fn parse_field_type(input: &str) -> Result<(Type, &str)> {
    let Some(first) = input.chars().next() else {
        return Err(SignatureError::InvalidDescriptor(input.to_string()));
    };
    if let Some(kind) = PrimitiveKind::from_descriptor_char(first) {
        return Ok((Type::Primitive(kind), &input[1..]));
    }
    match first {
        'L' => {
            if let Some(end) = input.find(';') {
                let name = &input[1..end];
                if name.is_empty() {
                    return Err(SignatureError::InvalidDescriptor(input.to_string()));
                }
                Ok((Type::Class(ClassName::from_internal(name)), &input[end + 1..]))
            } else {
                Err(SignatureError::InvalidDescriptor(input.to_string()))
            }
        }
        '[' => {
            let dimensions = input.bytes().take_while(|&b| b == b'[').count();
            if dimensions > MAX_ARRAY_DIMENSIONS {
                return Err(SignatureError::InvalidDescriptor(format!(
                    "array type has {dimensions} dimensions \
                     (at most {MAX_ARRAY_DIMENSIONS} are allowed)"
                )));
            }
            let (component, rest) = parse_field_type(&input[dimensions..])?;
            if component.is_void() {
                return Err(SignatureError::InvalidDescriptor(input.to_string()));
            }
            let ty = (0..dimensions).fold(component, |ty, _| Type::array_of(ty));
            Ok((ty, rest))
        }
        _ => Err(SignatureError::InvalidDescriptor(input.to_string())),
    }
}

pub fn field_descriptor(ty: &Type) -> String {
    let mut out = String::new();
    push_descriptor(&mut out, ty);
    out
}

pub fn method_descriptor(signature: &SignatureType) -> String {
    let mut out = String::from("(");
    for param in signature.parameters() {
        push_descriptor(&mut out, param);
    }
    out.push(')');
    push_descriptor(&mut out, signature.return_type());
    out
}

pub(crate) fn push_descriptor(out: &mut String, ty: &Type) {
    match ty {
        Type::Primitive(kind) => out.push(kind.descriptor_char()),
        Type::Class(name) => {
            out.push('L');
            out.push_str(&name.internal_name());
            out.push(';');
        }
        Type::Array(component) => {
            out.push('[');
            push_descriptor(out, component);
        }
    }
}
