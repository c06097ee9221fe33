//! Serde utilities.

/// Serializes byte buffers as standard base64 strings.
pub mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de};

    /// Serializes bytes as a base64 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the serializer fails.
    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    /// Deserializes bytes from a base64 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a string or not valid base64.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Blob(#[serde(with = "super::base64_bytes")] Vec<u8>);

    #[test]
    fn test_rejects_invalid_base64() {
        let result: Result<Blob, _> = serde_json::from_str("\"***\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_encodes_as_string() {
        let json = serde_json::to_string(&Blob(vec![0, 1, 2])).unwrap();
        assert_eq!(json, "\"AAEC\"");
    }
}
