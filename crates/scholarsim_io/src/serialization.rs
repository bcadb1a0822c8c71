//! Compact JSON used inside cache envelopes.

use crate::error::{Result, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Parses a JSON document. Blank input is an error rather than EOF noise.
pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T> {
    let json = json.trim();
    if json.is_empty() {
        return Err(StoreError::serialization("blank JSON document"));
    }
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholarsim_data::{FactorRecord, InternalFactors, SimulationKey};

    #[test]
    fn test_record_survives_json() {
        let record: FactorRecord = InternalFactors::uniform(4, SimulationKey::new(3, 9), 6.5).into();
        let back: FactorRecord = from_json(&format!("  {}\n", to_json(&record).unwrap())).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_blank_document_rejected() {
        let result: Result<SimulationKey> = from_json(" \n\t");
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_malformed_document_is_json_error() {
        let result: Result<SimulationKey> = from_json("{\"simulation_id\": ");
        assert!(matches!(result, Err(StoreError::Json(_))));
    }
}
