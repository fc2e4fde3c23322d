use std::collections::HashSet;

use crate::error::EngineError;

/// Opaque video identifier, globally unique within the content index.
pub type VideoId = String;

/// Normalized tag set derived from a video's metadata.
pub type TagSet = HashSet<String>;

/// Behavior event kind, with the fixed merge weight from spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Watch,
    Collect,
    Share,
    Star,
    Dislike,
}

impl Operation {
    /// Weight applied to `operationWeight[op] * log10(popularity)` during merge.
    pub fn weight(&self) -> f64 {
        match self {
            Operation::Watch => 0.1,
            Operation::Collect => 0.2,
            Operation::Share => 0.3,
            Operation::Star => 0.2,
            Operation::Dislike => -0.5,
        }
    }
}

impl TryFrom<i32> for Operation {
    type Error = EngineError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Operation::Watch),
            2 => Ok(Operation::Collect),
            3 => Ok(Operation::Share),
            4 => Ok(Operation::Star),
            5 => Ok(Operation::Dislike),
            other => Err(EngineError::InvalidOperation(other)),
        }
    }
}

/// Which ledger score-encoding variant a device is routed to.
///
/// Revision-2 sharding rule (spec.md §4.6): devices whose id begins with
/// hex characters `0`-`7` use V1, everything else uses V2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineVariant {
    V1,
    V2,
}

impl EngineVariant {
    pub fn for_device(device: &str) -> Self {
        match device.chars().next() {
            Some(c) if matches!(c, '0'..='7') => EngineVariant::V1,
            _ => EngineVariant::V2,
        }
    }

    pub fn ledger_key(&self, device: &str) -> String {
        match self {
            EngineVariant::V1 => format!("device|{device}|recommend"),
            EngineVariant::V2 => format!("device|{device}|recommend|v2"),
        }
    }

    pub fn hot_pool_key(&self) -> &'static str {
        match self {
            EngineVariant::V1 => "hot_video_zset",
            EngineVariant::V2 => "hot_video_zset_v2",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_weights_match_spec() {
        assert_eq!(Operation::Watch.weight(), 0.1);
        assert_eq!(Operation::Collect.weight(), 0.2);
        assert_eq!(Operation::Share.weight(), 0.3);
        assert_eq!(Operation::Star.weight(), 0.2);
        assert_eq!(Operation::Dislike.weight(), -0.5);
    }

    #[test]
    fn operation_from_code() {
        assert_eq!(Operation::try_from(1).unwrap(), Operation::Watch);
        assert_eq!(Operation::try_from(5).unwrap(), Operation::Dislike);
        assert!(Operation::try_from(6).is_err());
        assert!(Operation::try_from(0).is_err());
    }

    #[test]
    fn variant_sharding_by_hex_prefix() {
        assert_eq!(EngineVariant::for_device("0abc"), EngineVariant::V1);
        assert_eq!(EngineVariant::for_device("7zzz"), EngineVariant::V1);
        assert_eq!(EngineVariant::for_device("8abc"), EngineVariant::V2);
        assert_eq!(EngineVariant::for_device("fabc"), EngineVariant::V2);
        assert_eq!(EngineVariant::for_device(""), EngineVariant::V2);
    }

    #[test]
    fn ledger_key_format() {
        assert_eq!(
            EngineVariant::V1.ledger_key("abc"),
            "device|abc|recommend"
        );
        assert_eq!(
            EngineVariant::V2.ledger_key("abc"),
            "device|abc|recommend|v2"
        );
    }
}
