//! End-of-run pond report.

use serde::Serialize;

use aqua_growth::{DaysToTarget, SurvivalState};
use aqua_monitor::{Forecast, PondMonitor, Result};
use aqua_types::{Finding, PondId, UserId};

/// What an operator sees for one pond.
#[derive(Debug, Clone, Serialize)]
pub struct PondReport {
    pub pond_id: PondId,
    pub name: String,
    pub online: bool,
    pub survival: SurvivalState,
    pub days_to_target: DaysToTarget,
    pub forecast: Forecast,
    pub visible_findings: Vec<Finding>,
}

impl PondReport {
    pub async fn collect(monitor: &PondMonitor, pond_id: &PondId, user: &UserId, horizon_periods: u32) -> Result<Self> {
        let pond = monitor.pond(pond_id).await?;
        Ok(Self {
            online: monitor.is_online(pond_id),
            survival: monitor.get_survival(pond_id).await?,
            days_to_target: monitor.days_to_target(pond_id).await?,
            forecast: monitor.get_forecast(pond_id, horizon_periods).await?,
            visible_findings: monitor.visible_findings(pond_id, user).await?,
            pond_id: pond.id,
            name: pond.name,
        })
    }
}

/// Reports for every registered pond, in id order.
pub async fn collect_all(monitor: &PondMonitor, user: &UserId, horizon_periods: u32) -> Result<Vec<PondReport>> {
    let mut reports = Vec::new();
    for pond in monitor.ponds().await? {
        reports.push(PondReport::collect(monitor, &pond.id, user, horizon_periods).await?);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqua_monitor::{ManualClock, MonitorConfig};
    use aqua_types::{LiveReading, Pond};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_collect_all() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let monitor = Arc::new(PondMonitor::in_memory(MonitorConfig::default(), clock));
        for id in ["b", "a"] {
            monitor
                .register_pond(Pond::new(PondId::new(id), id.to_uppercase(), 500, start).with_initial_abw(3.0))
                .await
                .unwrap();
        }
        monitor
            .ingest_reading(&PondId::new("a"), LiveReading::new(start).with_oxygen(2.0))
            .await
            .unwrap();

        let reports = collect_all(&monitor, &UserId::new("u"), 4).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].pond_id, PondId::new("a"));
        assert_eq!(reports[0].visible_findings.len(), 1);
        assert_eq!(reports[0].survival.estimated_alive, 500);
        assert_eq!(reports[1].days_to_target, DaysToTarget::NoTarget);
        assert!(reports[1].visible_findings.is_empty());

        let json = serde_json::to_value(&reports).unwrap();
        assert_eq!(json[0]["visible_findings"][0]["key"], "do_low");
    }
}
