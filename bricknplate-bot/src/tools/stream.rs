//! Read-only tools over the loaded stream info.
//!
//! Absent sections produce a `message` saying there is no data rather than
//! an error, so the model can tell chat that nothing is configured.

use serde_json::{Value, json};

use super::ToolError;
use crate::memory::RecentEvents;
use crate::stream_info::StreamInfo;

pub const CATEGORIES: [&str; 5] = [
    "current_build",
    "schedule",
    "upcoming_builds",
    "channel_info",
    "faq",
];

fn no_data(what: &str) -> Value {
    json!({ "message": format!("No {what} information is available right now.") })
}

pub fn current_build(info: &StreamInfo) -> Value {
    match &info.current_build {
        Some(build) => json!({ "current_build": build }),
        None => no_data("current build"),
    }
}

pub fn schedule(info: &StreamInfo) -> Value {
    match info.schedule.as_ref().filter(|s| !s.is_empty()) {
        Some(schedule) => {
            let days: Vec<Value> = schedule
                .days()
                .into_iter()
                .map(|(day, hours)| json!({ "day": day, "hours": hours }))
                .collect();
            json!({ "schedule": days })
        }
        None => no_data("schedule"),
    }
}

pub fn upcoming_builds(info: &StreamInfo) -> Value {
    if info.upcoming_builds.is_empty() {
        return no_data("upcoming builds");
    }
    json!({ "upcoming_builds": info.upcoming_builds })
}

pub fn channel_info(info: &StreamInfo) -> Value {
    match &info.channel_info {
        Some(channel) => json!({ "channel_info": channel }),
        None => no_data("channel"),
    }
}

pub fn faq(info: &StreamInfo) -> Value {
    if info.faq.is_empty() {
        return no_data("FAQ");
    }
    json!({ "faq": info.faq })
}

/// One category, or the whole document when `category` is `None`.
pub fn stream_info(info: &StreamInfo, category: Option<&str>) -> Result<Value, ToolError> {
    let Some(category) = category.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(json!({
            "current_build": current_build(info),
            "schedule": schedule(info),
            "upcoming_builds": upcoming_builds(info),
            "channel_info": channel_info(info),
            "faq": faq(info),
        }));
    };
    match category.to_lowercase().as_str() {
        "current_build" => Ok(current_build(info)),
        "schedule" => Ok(schedule(info)),
        "upcoming_builds" => Ok(upcoming_builds(info)),
        "channel_info" => Ok(channel_info(info)),
        "faq" => Ok(faq(info)),
        _ => Err(ToolError::UnknownCategory(category.to_string())),
    }
}

pub fn recent_supporters(recent: &RecentEvents) -> Value {
    if recent.is_empty() {
        return json!({ "message": "Nobody has subscribed or raided since the bot started." });
    }
    json!({
        "subscribers": recent.subscribers,
        "raiders": recent.raiders,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_info::{FaqEntry, Schedule};

    #[test]
    fn schedule_keeps_weekday_order() {
        let info = StreamInfo {
            schedule: Some(Schedule {
                sunday: Some("No stream".into()),
                friday: Some("8pm-12am EST".into()),
                monday: Some("No stream".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let out = schedule(&info);
        let days: Vec<&str> = out["schedule"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["day"].as_str().unwrap())
            .collect();
        assert_eq!(days, vec!["monday", "friday", "sunday"]);
    }

    #[test]
    fn absent_sections_report_no_data() {
        let info = StreamInfo::default();
        for value in [
            current_build(&info),
            schedule(&info),
            upcoming_builds(&info),
            channel_info(&info),
            faq(&info),
        ] {
            assert!(value["message"].as_str().unwrap().starts_with("No "));
        }
        let empty_schedule = StreamInfo {
            schedule: Some(Schedule::default()),
            ..Default::default()
        };
        assert!(schedule(&empty_schedule)["message"].is_string());
    }

    #[test]
    fn category_lookup() {
        let info = StreamInfo {
            faq: vec![FaqEntry {
                question: "What camera do you use?".into(),
                answer: "A Sony a6400.".into(),
            }],
            ..Default::default()
        };
        let out = stream_info(&info, Some("FAQ")).unwrap();
        assert_eq!(out["faq"][0]["answer"], "A Sony a6400.");

        let all = stream_info(&info, None).unwrap();
        assert_eq!(all["faq"]["faq"][0]["question"], "What camera do you use?");
        assert!(all["current_build"]["message"].is_string());

        assert!(matches!(
            stream_info(&info, Some("merch")),
            Err(ToolError::UnknownCategory(c)) if c == "merch"
        ));
    }

    #[test]
    fn recent_supporters_lists_events() {
        let mut recent = RecentEvents::default();
        assert!(recent_supporters(&recent)["message"].is_string());
        recent.add_raider("bigstreamer", 30);
        let out = recent_supporters(&recent);
        assert_eq!(out["raiders"][0]["username"], "bigstreamer");
        assert_eq!(out["raiders"][0]["viewers"], 30);
    }
}
