//! Cache key derivation from fetch parameters.

use std::hash::{DefaultHasher, Hash, Hasher};

use serde::Serialize;

/// Derives the default cache key for a parameter value.
///
/// The parameters' serialized form is hashed, so values that serialize to
/// the same string map to the same entry. Stability is that of the
/// `Serialize` impl: derived structs are deterministic, while types that
/// fail to serialize or emit unordered maps should use a custom key
/// function instead.
pub fn default_key<P: Serialize>(params: &P) -> String {
    let mut hasher = DefaultHasher::new();
    if let Ok(serialized) = serde_json::to_string(params) {
        serialized.hash(&mut hasher);
    }
    hasher.finish().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Query {
        account: String,
        page: u32,
    }

    #[test]
    fn equal_params_share_a_key() {
        let a = Query {
            account: "acme".into(),
            page: 1,
        };
        let b = Query {
            account: "acme".into(),
            page: 1,
        };
        assert_eq!(default_key(&a), default_key(&b));
    }

    #[test]
    fn different_params_get_different_keys() {
        let a = Query {
            account: "acme".into(),
            page: 1,
        };
        let b = Query {
            account: "acme".into(),
            page: 2,
        };
        assert_ne!(default_key(&a), default_key(&b));
    }
}
