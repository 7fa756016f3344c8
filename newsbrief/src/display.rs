use chrono::{DateTime, Utc};

use crate::model::NewsItem;

/// Coarse age of a timestamp relative to `now`; empty when unknown.
pub fn human_time(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(published) = published else {
        return String::new();
    };
    let secs = (now - published).num_seconds();
    if secs < 60 {
        return "just now".to_string();
    }
    let mins = secs / 60;
    if mins < 60 {
        return format!("{mins} min ago");
    }
    let hrs = mins / 60;
    if hrs < 24 {
        return format!("{hrs} hr ago");
    }
    format!("{} d ago", hrs / 24)
}

/// One line per item: title, domain and age, with the link underneath.
pub fn render_items(items: &[NewsItem], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        let age = human_time(item.published_at, now);
        let mut meta = vec![];
        if !item.domain.is_empty() {
            meta.push(item.domain.as_str());
        }
        if !age.is_empty() {
            meta.push(age.as_str());
        }
        out.push_str(&format!("{:>2}. {}", i + 1, item.title));
        if !meta.is_empty() {
            out.push_str(&format!(" ({})", meta.join(", ")));
        }
        out.push('\n');
        if let Some(link) = item.link.as_deref() {
            out.push_str(&format!("    {link}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn relative_times() {
        let now = Utc.with_ymd_and_hms(2024, 11, 20, 12, 0, 0).unwrap();
        assert_eq!(human_time(None, now), "");
        assert_eq!(human_time(Some(now - Duration::seconds(59)), now), "just now");
        assert_eq!(human_time(Some(now + Duration::seconds(30)), now), "just now");
        assert_eq!(human_time(Some(now - Duration::minutes(5)), now), "5 min ago");
        assert_eq!(human_time(Some(now - Duration::hours(3)), now), "3 hr ago");
        assert_eq!(human_time(Some(now - Duration::hours(49)), now), "2 d ago");
    }

    #[test]
    fn render_lists_title_domain_and_link() {
        let now = Utc.with_ymd_and_hms(2024, 11, 20, 12, 0, 0).unwrap();
        let items = vec![
            NewsItem::new("Fed holds rates", Some("https://apnews.com/x".into()))
                .with_published_at(Some(now - Duration::minutes(10))),
            NewsItem::new("No link", None),
        ];
        assert_eq!(
            render_items(&items, now),
            " 1. Fed holds rates (apnews.com, 10 min ago)\n    https://apnews.com/x\n 2. No link\n"
        );
    }
}
