//! `{{function.<name>}}` helpers.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;

const RANDOM_STRING_LEN: usize = 10;

/// Evaluate the named function, or `None` when it is unknown.
pub fn call(name: &str) -> Option<String> {
    let value = match name {
        "random6Digits" => rand::thread_rng().gen_range(100_000..1_000_000).to_string(),
        "randomString" => rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_STRING_LEN)
            .map(char::from)
            .collect(),
        "currentDate" => Utc::now().format("%Y-%m-%d").to_string(),
        "currentTime" => Utc::now().format("%H:%M:%S").to_string(),
        "unixTimestamp" => Utc::now().timestamp().to_string(),
        "uuid" => uuid::Uuid::new_v4().to_string(),
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_digits_means_six_digits() {
        for _ in 0..100 {
            let v = call("random6Digits").unwrap();
            assert_eq!(v.len(), 6);
            assert!(v.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn time_helpers() {
        assert!(chrono::NaiveDate::parse_from_str(&call("currentDate").unwrap(), "%Y-%m-%d").is_ok());
        assert!(chrono::NaiveTime::parse_from_str(&call("currentTime").unwrap(), "%H:%M:%S").is_ok());
        assert!(call("unixTimestamp").unwrap().parse::<i64>().unwrap() > 0);
        assert_eq!(call("randomString").unwrap().len(), RANDOM_STRING_LEN);
    }

    #[test]
    fn unknown_function_is_none() {
        assert_eq!(call("launchRockets"), None);
    }
}
