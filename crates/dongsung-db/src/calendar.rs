use std::collections::BTreeMap;

use anyhow::Result;
use chrono::NaiveDate;

use crate::Database;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DaySummary {
    pub has_word: bool,
    pub share_count: i64,
}

impl Database {
    /// Union of the dates that have a daily word and the dates that have
    /// shares. Computed fresh on every call.
    pub fn calendar_summary(&self) -> Result<BTreeMap<NaiveDate, DaySummary>> {
        self.with_conn(|conn| {
            let mut summary: BTreeMap<NaiveDate, DaySummary> = BTreeMap::new();

            let mut words = conn.prepare("SELECT date FROM daily_words")?;
            for date in words.query_map([], |row| row.get::<_, NaiveDate>(0))? {
                summary.entry(date?).or_default().has_word = true;
            }

            let mut shares = conn.prepare("SELECT date, COUNT(*) FROM word_shares GROUP BY date")?;
            let counts = shares.query_map([], |row| Ok((row.get::<_, NaiveDate>(0)?, row.get::<_, i64>(1)?)))?;
            for entry in counts {
                let (date, count) = entry?;
                summary.entry(date).or_default().share_count = count;
            }

            Ok(summary)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Plain, date};
    use crate::words::WordDraft;

    #[test]
    fn merges_words_and_share_counts() {
        let db = Database::in_memory().unwrap();
        let draft = WordDraft {
            title: "t",
            passage: "",
            content: "c",
            author_name: "Ann",
            file_url: None,
            new_images: &[],
            remove_images: &[],
        };
        db.upsert_daily_word(date("2025-06-01"), &draft, &Plain("pw")).unwrap();
        db.upsert_daily_word(date("2025-06-03"), &draft, &Plain("pw")).unwrap();
        db.create_share(date("2025-06-01"), "Bob", "Grace today", &Plain("pw1")).unwrap();
        db.create_share(date("2025-06-02"), "Bob", "one", &Plain("pw1")).unwrap();
        db.create_share(date("2025-06-02"), "Cy", "two", &Plain("pw2")).unwrap();

        let summary = db.calendar_summary().unwrap();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[&date("2025-06-01")], DaySummary { has_word: true, share_count: 1 });
        assert_eq!(summary[&date("2025-06-02")], DaySummary { has_word: false, share_count: 2 });
        assert_eq!(summary[&date("2025-06-03")], DaySummary { has_word: true, share_count: 0 });
    }

    #[test]
    fn empty_database_has_empty_summary() {
        let db = Database::in_memory().unwrap();
        assert!(db.calendar_summary().unwrap().is_empty());
    }
}
