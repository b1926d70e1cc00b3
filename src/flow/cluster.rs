/// Answer from a cluster token service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenResult {
    /// Token granted.
    Ok,
    /// Token granted for the next tick; wait before proceeding.
    ShouldWait { wait_ms: u64 },
    /// The server has no rule for the requested flow id.
    NoRuleExists,
    /// The request was malformed.
    BadRequest,
    /// The server failed to answer.
    Fail,
    /// The server is saturated.
    TooManyRequests,
    /// Token denied.
    Blocked,
}

/// Source of cluster-wide flow tokens.
///
/// Only the local-fallback contract is defined here: when no service is
/// configured, or the service answers with anything other than a grant or
/// an explicit block, the rule either falls back to its local check or
/// passes, per `cluster_fallback_to_local`. Wire protocol and server
/// placement are out of scope.
pub trait TokenService: Send + Sync {
    fn request_token(&self, flow_id: u64, acquire: u32, prioritized: bool) -> TokenResult;
}
