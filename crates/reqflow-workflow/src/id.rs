//! Workflow identifiers: `{prefix}-{YYYYMMDD}-{4 base36 chars}`.
//!
//! Uniqueness is probabilistic (36^4 tokens per prefix per day). Nothing
//! detects or retries a collision.

use chrono::NaiveDate;
use rand::Rng;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const TOKEN_LEN: usize = 4;

pub fn generate_workflow_id(prefix: &str, date: NaiveDate) -> String {
    let mut rng = rand::thread_rng();
    let token: String = (0..TOKEN_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{prefix}-{}-{token}", date.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_shape() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let id = generate_workflow_id("WF-REQ", date);
        assert!(id.starts_with("WF-REQ-20260307-"), "{id}");
        let token = id.rsplit('-').next().unwrap();
        assert_eq!(token.len(), 4);
        assert!(token.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_custom_prefix() {
        let date = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        assert!(generate_workflow_id("HR", date).starts_with("HR-20261231-"));
    }
}
