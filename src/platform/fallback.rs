//! Process source for platforms without a native implementation.

use super::{ProcessSource, SocketOwner};
use crate::error::WitrError;
use crate::types::ProcessRecord;

#[derive(Debug, Default)]
pub struct FallbackSource;

impl ProcessSource for FallbackSource {
    fn get(&self, _pid: u32) -> Result<ProcessRecord, WitrError> {
        Err(WitrError::Unsupported("process inspection"))
    }

    fn list(&self) -> Result<Vec<ProcessRecord>, WitrError> {
        Err(WitrError::Unsupported("process listing"))
    }

    fn owner_of(&self, _port: u16) -> Result<SocketOwner, WitrError> {
        Err(WitrError::Unsupported("port lookup"))
    }

    fn environment(&self, _pid: u32) -> Result<Vec<String>, WitrError> {
        Err(WitrError::Unsupported("environment inspection"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_reports_unsupported() {
        let err = FallbackSource.get(1).unwrap_err();
        assert!(err.to_string().contains("not supported"));
        assert!(matches!(
            FallbackSource.owner_of(80),
            Err(WitrError::Unsupported(_))
        ));
    }
}
