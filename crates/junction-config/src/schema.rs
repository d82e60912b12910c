use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::JunctionConfig;

/// JSON schema for `junction.toml`, for editor tooling and CI validation.
#[must_use]
pub fn json_schema() -> RootSchema {
    schema_for!(JunctionConfig)
}

/// [`json_schema`] rendered as pretty-printed JSON.
pub fn json_schema_string() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json_schema())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_top_level_sections() {
        let rendered = json_schema_string().unwrap();
        for key in ["thunk_cache", "invoke", "logging", "max_entries", "memoize_as_type"] {
            assert!(rendered.contains(key), "schema should mention {key}");
        }
    }
}
