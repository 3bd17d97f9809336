//! Health verdicts for CNPG clusters.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use super::cnpg::{CnpgCluster, CONTINUOUS_ARCHIVING_CONDITION};

/// Outcome of a single health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckStatus {
    Ok,
    Error,
    Unknown,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Ok => "ok",
            CheckStatus::Error => "error",
            CheckStatus::Unknown => "unknown",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CheckStatus::Ok)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Health of one CNPG cluster at one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatusRecord {
    pub cluster: String,
    pub namespace: String,
    pub cnpg_cluster: String,
    pub instances_status: CheckStatus,
    pub instances_ready: i64,
    pub instances_total: i64,
    pub base_backup_status: CheckStatus,
    pub archiving_status: CheckStatus,
}

impl StatusRecord {
    /// All three checks passed
    pub fn is_ok(&self) -> bool {
        self.instances_status.is_ok()
            && self.base_backup_status.is_ok()
            && self.archiving_status.is_ok()
    }

    /// Members in declaration order, stringified, under their wire names
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("cluster", self.cluster.clone()),
            ("ns", self.namespace.clone()),
            ("cnpgCluster", self.cnpg_cluster.clone()),
            ("instancesStatus", self.instances_status.to_string()),
            ("instancesReady", self.instances_ready.to_string()),
            ("instancesTotal", self.instances_total.to_string()),
            ("baseBackupStatus", self.base_backup_status.to_string()),
            ("archivingStatus", self.archiving_status.to_string()),
        ]
    }

    /// Canonical dedup key: a JSON array of `[name, value]` pairs in field order
    pub fn fingerprint(&self) -> String {
        let pairs: Vec<[String; 2]> = self
            .fields()
            .into_iter()
            .map(|(name, value)| [name.to_string(), value])
            .collect();
        // Serializing a Vec of string pairs cannot fail
        serde_json::to_string(&pairs).unwrap_or_default()
    }
}

/// Computes a `StatusRecord` per CNPG cluster
#[derive(Debug, Clone)]
pub struct StatusEvaluator {
    max_backup_age: Duration,
}

impl Default for StatusEvaluator {
    fn default() -> Self {
        Self::new(Duration::hours(26))
    }
}

impl StatusEvaluator {
    pub fn new(max_backup_age: Duration) -> Self {
        Self { max_backup_age }
    }

    pub fn evaluate(&self, cluster: &str, record: &CnpgCluster, now: DateTime<Utc>) -> StatusRecord {
        let instances_ready = record.status.ready_instances.unwrap_or(0);
        let instances_total = record.status.instances;
        let instances_status = if instances_ready == instances_total {
            CheckStatus::Ok
        } else {
            CheckStatus::Error
        };

        StatusRecord {
            cluster: cluster.to_string(),
            namespace: record.namespace.clone(),
            cnpg_cluster: record.name.clone(),
            instances_status,
            instances_ready,
            instances_total,
            base_backup_status: self.base_backup_status(record, now),
            archiving_status: Self::archiving_status(record),
        }
    }

    pub fn base_backup_status(&self, record: &CnpgCluster, now: DateTime<Utc>) -> CheckStatus {
        if !record.backup_configured {
            return CheckStatus::Ok;
        }

        let status = &record.status;
        match (status.last_successful_backup, status.last_failed_backup) {
            (Some(success), Some(failure)) if failure > success => CheckStatus::Error,
            (Some(success), _) if now - success > self.max_backup_age => CheckStatus::Error,
            (Some(_), _) => CheckStatus::Ok,
            (None, Some(_)) => CheckStatus::Error,
            (None, None) => CheckStatus::Unknown,
        }
    }

    pub fn archiving_status(record: &CnpgCluster) -> CheckStatus {
        if !record.backup_configured {
            return CheckStatus::Ok;
        }

        match record.status.condition(CONTINUOUS_ARCHIVING_CONDITION) {
            Some(condition) if condition.status == "True" => CheckStatus::Ok,
            Some(_) => CheckStatus::Error,
            None => CheckStatus::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cnpg::{CnpgClusterStatus, StatusCondition};

    fn record(ready: Option<i64>, total: i64) -> CnpgCluster {
        CnpgCluster {
            name: "pg1".to_string(),
            namespace: "db".to_string(),
            backup_configured: false,
            status: CnpgClusterStatus {
                instances: total,
                ready_instances: ready,
                ..Default::default()
            },
        }
    }

    fn with_backup(mut record: CnpgCluster) -> CnpgCluster {
        record.backup_configured = true;
        record
    }

    #[test]
    fn test_instances_status() {
        let evaluator = StatusEvaluator::default();
        let now = Utc::now();

        let degraded = evaluator.evaluate("prod", &record(Some(2), 3), now);
        assert_eq!(degraded.instances_status, CheckStatus::Error);
        assert!(!degraded.is_ok());

        let healthy = evaluator.evaluate("prod", &record(Some(3), 3), now);
        assert_eq!(healthy.instances_status, CheckStatus::Ok);
        assert!(healthy.is_ok());
    }

    #[test]
    fn test_missing_ready_instances_defaults_to_zero() {
        let status = StatusEvaluator::default().evaluate("prod", &record(None, 1), Utc::now());
        assert_eq!(status.instances_ready, 0);
        assert_eq!(status.instances_status, CheckStatus::Error);
    }

    #[test]
    fn test_base_backup_classification() {
        let evaluator = StatusEvaluator::new(Duration::hours(26));
        let now = Utc::now();

        let mut r = with_backup(record(Some(1), 1));
        assert_eq!(evaluator.base_backup_status(&r, now), CheckStatus::Unknown);

        r.status.last_successful_backup = Some(now - Duration::hours(2));
        assert_eq!(evaluator.base_backup_status(&r, now), CheckStatus::Ok);

        r.status.last_failed_backup = Some(now - Duration::hours(1));
        assert_eq!(evaluator.base_backup_status(&r, now), CheckStatus::Error);

        r.status.last_failed_backup = None;
        r.status.last_successful_backup = Some(now - Duration::hours(30));
        assert_eq!(evaluator.base_backup_status(&r, now), CheckStatus::Error);

        r.status.last_successful_backup = None;
        r.status.last_failed_backup = Some(now);
        assert_eq!(evaluator.base_backup_status(&r, now), CheckStatus::Error);
    }

    #[test]
    fn test_archiving_classification() {
        let mut r = with_backup(record(Some(1), 1));
        assert_eq!(StatusEvaluator::archiving_status(&r), CheckStatus::Unknown);

        r.status.conditions = vec![StatusCondition {
            type_: "ContinuousArchiving".to_string(),
            status: "True".to_string(),
        }];
        assert_eq!(StatusEvaluator::archiving_status(&r), CheckStatus::Ok);

        r.status.conditions[0].status = "False".to_string();
        assert_eq!(StatusEvaluator::archiving_status(&r), CheckStatus::Error);
    }

    #[test]
    fn test_no_backup_configured_is_ok() {
        let status = StatusEvaluator::default().evaluate("prod", &record(Some(1), 1), Utc::now());
        assert_eq!(status.base_backup_status, CheckStatus::Ok);
        assert_eq!(status.archiving_status, CheckStatus::Ok);
    }

    #[test]
    fn test_fields_keep_declaration_order() {
        let status = StatusEvaluator::default().evaluate("prod", &record(Some(2), 3), Utc::now());
        let names: Vec<_> = status.fields().into_iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec![
                "cluster",
                "ns",
                "cnpgCluster",
                "instancesStatus",
                "instancesReady",
                "instancesTotal",
                "baseBackupStatus",
                "archivingStatus",
            ]
        );
    }

    #[test]
    fn test_fingerprint_is_canonical() {
        let now = Utc::now();
        let evaluator = StatusEvaluator::default();
        let a = evaluator.evaluate("prod", &record(Some(2), 3), now);
        let b = evaluator.evaluate("prod", &record(Some(2), 3), now);
        let c = evaluator.evaluate("prod", &record(Some(3), 3), now);

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert!(a
            .fingerprint()
            .starts_with(r#"[["cluster","prod"],["ns","db"],["cnpgCluster","pg1"]"#));
    }
}
