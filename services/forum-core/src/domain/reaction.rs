//! 点赞/点踩状态机
//!
//! 每个 (actor, target) 只有三种状态：无、赞、踩。
//! 请求与当前相同的极性会清除它；请求相反的极性会翻转；从无状态请求则插入。

use std::fmt;
use std::str::FromStr;

use forum_common::{TargetId, UserId};
use serde::{Deserialize, Serialize};

/// 极性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Like,
    Dislike,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }

    /// 表单里的 `is_like` 布尔字段
    pub fn from_is_like(is_like: bool) -> Self {
        if is_like { Self::Like } else { Self::Dislike }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Polarity {
    type Err = ReactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "like" | "true" => Ok(Self::Like),
            "dislike" | "false" => Ok(Self::Dislike),
            other => Err(ReactionError::InvalidPolarity(other.to_string())),
        }
    }
}

/// 目标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Post,
    Comment,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = ReactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "post" => Ok(Self::Post),
            "comment" => Ok(Self::Comment),
            other => Err(ReactionError::InvalidTargetKind(other.to_string())),
        }
    }
}

/// 被投票的帖子或评论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReactionTarget {
    pub id: TargetId,
    pub kind: TargetKind,
}

impl ReactionTarget {
    pub fn new(id: TargetId, kind: TargetKind) -> Self {
        Self { id, kind }
    }

    pub fn post(id: i64) -> Self {
        Self::new(TargetId(id), TargetKind::Post)
    }

    pub fn comment(id: i64) -> Self {
        Self::new(TargetId(id), TargetKind::Comment)
    }
}

impl fmt::Display for ReactionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// 唯一键 (actor, target)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReactionKey {
    pub actor: UserId,
    pub target: ReactionTarget,
}

impl ReactionKey {
    pub fn new(actor: UserId, target: ReactionTarget) -> Self {
        Self { actor, target }
    }
}

/// 一个 (actor, target) 的状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReactionState {
    #[default]
    None,
    Liked,
    Disliked,
}

impl ReactionState {
    pub fn polarity(&self) -> Option<Polarity> {
        match self {
            Self::None => None,
            Self::Liked => Some(Polarity::Like),
            Self::Disliked => Some(Polarity::Dislike),
        }
    }

    /// 状态转移，返回下一状态和需要执行的行操作
    pub fn apply(self, requested: Polarity) -> (ReactionState, RowOperation) {
        match self.polarity() {
            None => (requested.into(), RowOperation::Insert(requested)),
            Some(current) if current == requested => (ReactionState::None, RowOperation::Delete),
            Some(_) => (requested.into(), RowOperation::Update(requested)),
        }
    }
}

impl From<Polarity> for ReactionState {
    fn from(p: Polarity) -> Self {
        match p {
            Polarity::Like => Self::Liked,
            Polarity::Dislike => Self::Disliked,
        }
    }
}

impl From<Option<Polarity>> for ReactionState {
    fn from(p: Option<Polarity>) -> Self {
        p.map(Into::into).unwrap_or_default()
    }
}

/// 行操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowOperation {
    Insert(Polarity),
    Update(Polarity),
    Delete,
}

impl RowOperation {
    /// metrics 标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::Delete => "delete",
        }
    }
}

/// 聚合计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
}

impl ReactionCounts {
    pub fn new(likes: i64, dislikes: i64) -> Self {
        Self { likes, dislikes }
    }
}

/// 一次切换的结果；计数与本次写入一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    pub state: ReactionState,
    pub operation: RowOperation,
    pub counts: ReactionCounts,
}

/// 表单输入解析后的投票请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionRequest {
    pub target: ReactionTarget,
    pub polarity: Polarity,
}

impl ReactionRequest {
    /// 解析原始输入；在访问存储之前拒绝不合法的请求
    pub fn parse(
        target_id: i64,
        target_kind: Option<&str>,
        polarity: Option<&str>,
    ) -> Result<Self, ReactionError> {
        let kind = target_kind
            .filter(|k| !k.trim().is_empty())
            .ok_or(ReactionError::MissingTargetKind)?
            .parse::<TargetKind>()?;
        let polarity = polarity
            .ok_or_else(|| ReactionError::InvalidPolarity(String::new()))?
            .parse::<Polarity>()?;

        Ok(Self {
            target: ReactionTarget::new(TargetId(target_id), kind),
            polarity,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReactionError {
    #[error("Invalid polarity: '{0}'")]
    InvalidPolarity(String),

    #[error("Invalid target kind: '{0}'")]
    InvalidTargetKind(String),

    #[error("Target kind is required")]
    MissingTargetKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use Polarity::*;
        use ReactionState as S;

        let cases = [
            (S::None, Like, S::Liked, RowOperation::Insert(Like)),
            (S::None, Dislike, S::Disliked, RowOperation::Insert(Dislike)),
            (S::Liked, Like, S::None, RowOperation::Delete),
            (S::Liked, Dislike, S::Disliked, RowOperation::Update(Dislike)),
            (S::Disliked, Dislike, S::None, RowOperation::Delete),
            (S::Disliked, Like, S::Liked, RowOperation::Update(Like)),
        ];

        for (current, requested, next, op) in cases {
            assert_eq!(current.apply(requested), (next, op), "{:?} + {:?}", current, requested);
        }
    }

    #[test]
    fn test_same_polarity_twice_returns_to_none() {
        for p in [Polarity::Like, Polarity::Dislike] {
            let (once, _) = ReactionState::None.apply(p);
            let (twice, _) = once.apply(p);
            assert_eq!(twice, ReactionState::None);
        }
    }

    #[test]
    fn test_polarity_parsing() {
        assert_eq!("like".parse::<Polarity>().unwrap(), Polarity::Like);
        assert_eq!("DISLIKE".parse::<Polarity>().unwrap(), Polarity::Dislike);
        assert_eq!("true".parse::<Polarity>().unwrap(), Polarity::Like);
        assert_eq!("false".parse::<Polarity>().unwrap(), Polarity::Dislike);
        assert!("meh".parse::<Polarity>().is_err());
        assert_eq!(Polarity::from_is_like(false), Polarity::Dislike);
    }

    #[test]
    fn test_request_parse() {
        let req = ReactionRequest::parse(9, Some("post"), Some("like")).unwrap();
        assert_eq!(req.target, ReactionTarget::post(9));
        assert_eq!(req.polarity, Polarity::Like);

        assert!(matches!(
            ReactionRequest::parse(9, None, Some("like")),
            Err(ReactionError::MissingTargetKind)
        ));
        assert!(matches!(
            ReactionRequest::parse(9, Some(" "), Some("like")),
            Err(ReactionError::MissingTargetKind)
        ));
        assert!(matches!(
            ReactionRequest::parse(9, Some("thread"), Some("like")),
            Err(ReactionError::InvalidTargetKind(_))
        ));
        assert!(matches!(
            ReactionRequest::parse(9, Some("comment"), None),
            Err(ReactionError::InvalidPolarity(_))
        ));
    }

    #[test]
    fn test_state_from_polarity() {
        assert_eq!(ReactionState::from(None), ReactionState::None);
        assert_eq!(ReactionState::from(Some(Polarity::Dislike)), ReactionState::Disliked);
        assert_eq!(ReactionState::Liked.polarity(), Some(Polarity::Like));
    }
}
