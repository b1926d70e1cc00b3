use crate::flow::rule::{FlowGrade, FlowRule};
use crate::stat::StatisticNode;

/// Decision for one rule against one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AdmitOutcome {
    Pass,
    Reject,
    /// Admitted against a future bucket; the caller must park for this many
    /// milliseconds before proceeding. Waiting and occupied passes are
    /// already booked on the node when this is returned.
    PriorityWait(u64),
}

/// Immediate-reject throttling: compare live usage against the threshold,
/// letting prioritized QPS requests borrow from a future bucket.
///
/// `occupy_timeout_ms` is read once by the caller and passed in, so a
/// config change between the decision and the sleep cannot skew the wait.
pub(crate) fn can_pass(
    rule: &FlowRule,
    stats: &StatisticNode,
    acquire: u32,
    prioritized: bool,
    now_ms: u64,
    occupy_timeout_ms: u64,
) -> AdmitOutcome {
    let used = match rule.grade {
        FlowGrade::Thread => stats.cur_thread_num() as f64,
        FlowGrade::Qps => stats.pass_qps(now_ms).floor(),
    };

    if used + acquire as f64 <= rule.count {
        return AdmitOutcome::Pass;
    }

    if prioritized && rule.grade == FlowGrade::Qps {
        let wait = stats.try_occupy_next(now_ms, acquire, rule.count, occupy_timeout_ms);
        if wait < occupy_timeout_ms {
            stats.add_waiting_request(now_ms + wait, acquire);
            stats.add_occupied_pass(now_ms, acquire);
            return AdmitOutcome::PriorityWait(wait);
        }
    }

    AdmitOutcome::Reject
}
