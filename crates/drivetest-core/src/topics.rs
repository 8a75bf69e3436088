//! The fixed knowledge-tag vocabulary.
//!
//! Tags are carried by bank records. Records without tags get them derived
//! from the question text using the keyword rule of each tag.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TrainerError;

/// One of the 21 knowledge tags.
///
/// The declaration order is the vocabulary order used for sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    TrafficSigns,
    RoadMarkings,
    TrafficLights,
    VehicleLights,
    Fines,
    PenaltyPoints,
    RightOfWay,
    SpeedLimits,
    FollowingDistance,
    Overtaking,
    Parking,
    UTurnsAndTurning,
    Expressways,
    SeatBelts,
    DrunkDriving,
    HitAndRun,
    AccidentHandling,
    SevereWeather,
    EmergencyAvoidance,
    FirstAid,
    HazardousGoods,
}

impl Topic {
    pub const ALL: [Topic; 21] = [
        Topic::TrafficSigns,
        Topic::RoadMarkings,
        Topic::TrafficLights,
        Topic::VehicleLights,
        Topic::Fines,
        Topic::PenaltyPoints,
        Topic::RightOfWay,
        Topic::SpeedLimits,
        Topic::FollowingDistance,
        Topic::Overtaking,
        Topic::Parking,
        Topic::UTurnsAndTurning,
        Topic::Expressways,
        Topic::SeatBelts,
        Topic::DrunkDriving,
        Topic::HitAndRun,
        Topic::AccidentHandling,
        Topic::SevereWeather,
        Topic::EmergencyAvoidance,
        Topic::FirstAid,
        Topic::HazardousGoods,
    ];

    /// Wire label, as used by bank files and the mnemonic table.
    pub fn label(self) -> &'static str {
        match self {
            Topic::TrafficSigns => "交通标志",
            Topic::RoadMarkings => "交通标线",
            Topic::TrafficLights => "交通信号灯",
            Topic::VehicleLights => "灯光使用",
            Topic::Fines => "罚款金额",
            Topic::PenaltyPoints => "记分规则",
            Topic::RightOfWay => "让行规则",
            Topic::SpeedLimits => "车速规定",
            Topic::FollowingDistance => "安全车距",
            Topic::Overtaking => "超车规定",
            Topic::Parking => "停车规定",
            Topic::UTurnsAndTurning => "掉头转弯",
            Topic::Expressways => "高速公路",
            Topic::SeatBelts => "安全带使用",
            Topic::DrunkDriving => "酒驾醉驾",
            Topic::HitAndRun => "肇事逃逸",
            Topic::AccidentHandling => "事故处理",
            Topic::SevereWeather => "恶劣天气",
            Topic::EmergencyAvoidance => "紧急避险",
            Topic::FirstAid => "伤员急救",
            Topic::HazardousGoods => "危化品运输",
        }
    }

    /// ASCII alias accepted on the command line.
    pub fn slug(self) -> &'static str {
        match self {
            Topic::TrafficSigns => "traffic_signs",
            Topic::RoadMarkings => "road_markings",
            Topic::TrafficLights => "traffic_lights",
            Topic::VehicleLights => "vehicle_lights",
            Topic::Fines => "fines",
            Topic::PenaltyPoints => "penalty_points",
            Topic::RightOfWay => "right_of_way",
            Topic::SpeedLimits => "speed_limits",
            Topic::FollowingDistance => "following_distance",
            Topic::Overtaking => "overtaking",
            Topic::Parking => "parking",
            Topic::UTurnsAndTurning => "u_turns_and_turning",
            Topic::Expressways => "expressways",
            Topic::SeatBelts => "seat_belts",
            Topic::DrunkDriving => "drunk_driving",
            Topic::HitAndRun => "hit_and_run",
            Topic::AccidentHandling => "accident_handling",
            Topic::SevereWeather => "severe_weather",
            Topic::EmergencyAvoidance => "emergency_avoidance",
            Topic::FirstAid => "first_aid",
            Topic::HazardousGoods => "hazardous_goods",
        }
    }

    fn keywords(self) -> &'static str {
        match self {
            Topic::TrafficSigns => r"标志|标识|这个标志",
            Topic::RoadMarkings => r"标线|虚线|实线|导向线|路面标记",
            Topic::TrafficLights => r"信号灯|红灯|绿灯|黄灯|闪光警告",
            Topic::VehicleLights => r"灯光|远光|近光|雾灯|转向灯|危险报警|示廓灯",
            Topic::Fines => r"罚款|处\d+元|元以[上下]罚款",
            Topic::PenaltyPoints => r"扣\d+分|记\d+分|一次记|记分",
            Topic::RightOfWay => r"让行|让路|先行|优先通行|礼让",
            Topic::SpeedLimits => r"最高速度|最低速度|时速|限速|超速|车速",
            Topic::FollowingDistance => r"车距|跟车距离|保持距离|安全距离",
            Topic::Overtaking => r"超车|超越|借道超",
            Topic::Parking => r"停车|停放|泊车|禁停|临时停车",
            Topic::UTurnsAndTurning => r"掉头|调头|转弯|左转|右转",
            Topic::Expressways => r"高速公路|高速路|匝道|加速车道|减速车道|应急车道",
            Topic::SeatBelts => r"安全带|系.*带",
            Topic::DrunkDriving => r"饮酒|醉酒|酒后|醉驾|酒驾",
            Topic::HitAndRun => r"逃逸|肇事逃",
            Topic::AccidentHandling => r"事故|碰撞|追尾|刮擦|事故现场",
            Topic::SevereWeather => r"雨天|雪天|雾天|冰雪|暴风|大风|泥泞|涉水|湿滑",
            Topic::EmergencyAvoidance => r"爆胎|制动失灵|转向失控|起火|自燃|紧急制动|紧急避险",
            Topic::FirstAid => r"急救|伤员|止血|骨折|人工呼吸|心肺复苏",
            Topic::HazardousGoods => r"危险品|危化品|爆炸品|易燃|有毒|腐蚀",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Topic {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Topic::ALL
            .into_iter()
            .find(|t| t.label() == needle || t.slug().eq_ignore_ascii_case(needle))
            .ok_or_else(|| TrainerError::UnknownTopic(needle.to_string()))
    }
}

impl Serialize for Topic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

static RULES: LazyLock<Vec<(Topic, Regex)>> = LazyLock::new(|| {
    Topic::ALL
        .into_iter()
        .map(|topic| {
            let re = Regex::new(topic.keywords()).expect("topic keyword rules are valid regexes");
            (topic, re)
        })
        .collect()
});

/// Derive tags for a question from its text, options and explanation.
pub fn classify(content: &str, options: &[String], explanation: &str) -> BTreeSet<Topic> {
    let text = format!("{content}{}{explanation}", options.join(" "));
    RULES
        .iter()
        .filter(|(_, re)| re.is_match(&text))
        .map(|(topic, _)| *topic)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_is_complete_and_unique() {
        let labels: BTreeSet<&str> = Topic::ALL.iter().map(|t| t.label()).collect();
        let slugs: BTreeSet<&str> = Topic::ALL.iter().map(|t| t.slug()).collect();
        assert_eq!(labels.len(), 21);
        assert_eq!(slugs.len(), 21);
    }

    #[test]
    fn parse_label_and_slug() {
        assert_eq!("灯光使用".parse::<Topic>().unwrap(), Topic::VehicleLights);
        assert_eq!("Seat_Belts".parse::<Topic>().unwrap(), Topic::SeatBelts);
        let err = "驾驶技巧".parse::<Topic>().unwrap_err();
        assert_eq!(err.kind(), "unknown_topic");
    }

    #[test]
    fn serde_uses_label() {
        let json = serde_json::to_string(&Topic::Expressways).unwrap();
        assert_eq!(json, "\"高速公路\"");
        let back: Topic = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Topic::Expressways);
    }

    #[test]
    fn classify_matches_keywords() {
        let topics = classify(
            "在高速公路上遇到大雾时应当怎样使用灯光？",
            &["开启雾灯".to_string(), "开启远光灯".to_string()],
            "雾天应开启雾灯和危险报警闪光灯。",
        );
        assert!(topics.contains(&Topic::Expressways));
        assert!(topics.contains(&Topic::VehicleLights));
        assert!(topics.contains(&Topic::SevereWeather));
        assert!(!topics.contains(&Topic::DrunkDriving));
    }

    #[test]
    fn classify_fine_amounts() {
        let topics = classify("驾驶人饮酒后驾驶机动车，处200元罚款", &[], "");
        assert!(topics.contains(&Topic::Fines));
        assert!(topics.contains(&Topic::DrunkDriving));
    }
}
