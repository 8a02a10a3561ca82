//! 通用类型定义

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// 用户 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From)]
#[display("{_0}")]
pub struct UserId(pub i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

/// 帖子或评论的 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From)]
#[display("{_0}")]
pub struct TargetId(pub i64);

impl TargetId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_display_raw_value() {
        assert_eq!(UserId::new(7).to_string(), "7");
        assert_eq!(TargetId::from(9).to_string(), "9");
    }

    #[test]
    fn test_ids_are_ordered() {
        assert!(UserId(1) < UserId(2));
        assert_eq!(TargetId(3).value(), 3);
    }
}
