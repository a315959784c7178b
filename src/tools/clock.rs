//! Wall-clock tool.

use async_trait::async_trait;
use chrono::Local;
use serde_json::Value;

use super::Tool;

/// Format used for the reported time, day first.
pub const TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Reports the current local date and time.
///
/// The clock is read on every call; results are never cached.
pub struct CurrentTime;

#[async_trait]
impl Tool for CurrentTime {
    fn name(&self) -> &str {
        "get_current_time_tool"
    }

    fn description(&self) -> &str {
        "Returns the current local date and time formatted as DD/MM/YYYY HH:MM:SS."
    }

    async fn execute(&self, _args: Value) -> anyhow::Result<String> {
        Ok(Local::now().format(TIME_FORMAT).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use serde_json::json;

    #[tokio::test]
    async fn reports_parseable_local_time() {
        let out = CurrentTime.execute(json!({})).await.unwrap();
        let parsed = NaiveDateTime::parse_from_str(&out, TIME_FORMAT).unwrap();
        let now = Local::now().naive_local();
        assert!((now - parsed).num_seconds().abs() <= 5);
    }

    #[tokio::test]
    async fn consecutive_calls_differ_at_most_in_time_of_day() {
        let first = CurrentTime.execute(Value::Null).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let second = CurrentTime.execute(Value::Null).await.unwrap();

        let a = NaiveDateTime::parse_from_str(&first, TIME_FORMAT).unwrap();
        let b = NaiveDateTime::parse_from_str(&second, TIME_FORMAT).unwrap();
        assert_ne!(first, second);
        // Modulo an hour so a DST shift between the calls still passes.
        assert!((b - a).num_seconds().rem_euclid(3600) < 60);
    }
}
