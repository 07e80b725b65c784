//! Read-side monthly aggregation over the report store.
//!
//! Every method is a plain function of current store contents — report
//! volume is small, so nothing is cached and statistics are recomputed on
//! each call. When several tasks scraped the same month, aggregates read
//! the latest task's snapshot so agents are not double-counted.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

use crate::report::model::month_name;
use crate::storage::{MonthDescriptor, Storage};

#[derive(Debug, Error)]
pub enum QueryError {
    /// The month has no stored reports at all — distinct from a month whose
    /// agents simply made zero calls.
    #[error("no reports stored for {year}-{month:02}")]
    NoData { year: i32, month: u32 },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyStatistics {
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub total_agents: u64,
    pub total_reports: u64,
    pub total_incoming_calls: u64,
    pub total_outgoing_calls: u64,
    pub total_calls: u64,
    pub agents_with_calls: u64,
    pub average_calls_per_agent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentRanking {
    pub agent_name: String,
    pub agent_number: String,
    pub incoming_calls: u64,
    pub outgoing_calls: u64,
    pub total_calls: u64,
    pub months_reported: u64,
}

pub struct QueryService {
    store: Storage,
}

impl QueryService {
    pub fn new(store: Storage) -> Self {
        Self { store }
    }

    pub async fn available_months(&self) -> Result<Vec<MonthDescriptor>, QueryError> {
        Ok(self.store.list_months().await?)
    }

    pub async fn monthly_statistics(
        &self,
        year: i32,
        month: u32,
    ) -> Result<MonthlyStatistics, QueryError> {
        let Some(latest_task) = self.store.latest_task_id(year, month).await? else {
            return Err(QueryError::NoData { year, month });
        };

        let all = self.store.query_month(year, month).await?;
        let total_reports = all
            .iter()
            .map(|r| r.task_id.as_str())
            .collect::<BTreeSet<_>>()
            .len() as u64;

        let snapshot: Vec<_> = all.iter().filter(|r| r.task_id == latest_task).collect();
        let total_incoming_calls: u64 = snapshot
            .iter()
            .map(|r| u64::from(r.incoming_calls.total))
            .sum();
        let total_outgoing_calls: u64 = snapshot
            .iter()
            .map(|r| u64::from(r.outgoing_calls.total))
            .sum();
        let total_calls = total_incoming_calls + total_outgoing_calls;
        let agents_with_calls = snapshot.iter().filter(|r| r.total_calls() > 0).count() as u64;

        let average_calls_per_agent = if agents_with_calls > 0 {
            round2(total_calls as f64 / agents_with_calls as f64)
        } else {
            0.0
        };

        Ok(MonthlyStatistics {
            year,
            month,
            month_name: month_name(month).to_string(),
            total_agents: snapshot.len() as u64,
            total_reports,
            total_incoming_calls,
            total_outgoing_calls,
            total_calls,
            agents_with_calls,
            average_calls_per_agent,
        })
    }

    /// All agents ordered by total calls descending; ties break on
    /// agent_name ascending so repeated calls return the same order.
    pub async fn performance_ranking(&self) -> Result<Vec<AgentRanking>, QueryError> {
        let mut per_agent: BTreeMap<String, AgentRanking> = BTreeMap::new();

        for descriptor in self.store.list_months().await? {
            let Some(latest_task) = self
                .store
                .latest_task_id(descriptor.year, descriptor.month)
                .await?
            else {
                continue;
            };

            for report in self
                .store
                .query_month(descriptor.year, descriptor.month)
                .await?
            {
                if report.task_id != latest_task {
                    continue;
                }
                let entry = per_agent
                    .entry(report.agent_name.clone())
                    .or_insert_with(|| AgentRanking {
                        agent_name: report.agent_name.clone(),
                        agent_number: report.agent_number.clone(),
                        incoming_calls: 0,
                        outgoing_calls: 0,
                        total_calls: 0,
                        months_reported: 0,
                    });
                entry.agent_number = report.agent_number.clone();
                entry.incoming_calls += u64::from(report.incoming_calls.total);
                entry.outgoing_calls += u64::from(report.outgoing_calls.total);
                entry.months_reported += 1;
            }
        }

        let mut ranking: Vec<AgentRanking> = per_agent
            .into_values()
            .map(|mut entry| {
                entry.total_calls = entry.incoming_calls + entry.outgoing_calls;
                entry
            })
            .collect();

        ranking.sort_by(|a, b| {
            b.total_calls
                .cmp(&a.total_calls)
                .then_with(|| a.agent_name.cmp(&b.agent_name))
        });

        Ok(ranking)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::round2;

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(9.0), 9.0);
        assert_eq!(round2(8.333_333), 8.33);
        assert_eq!(round2(8.336), 8.34);
        assert_eq!(round2(17.0 / 3.0), 5.67);
    }
}
