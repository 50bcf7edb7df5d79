use posture_ipc::Language;

/// Strings the daemon puts into notifications.
pub struct Messages {
    pub title: &'static str,
    pub break_time: &'static str,
    pub break_time_desc: &'static str,
    pub remind_later: &'static str,
    pub stretch_now: &'static str,
    pub guide_title: &'static str,
}

const EN: Messages = Messages {
    title: "Posture Reminder",
    break_time: "Break Time",
    break_time_desc: "Take a short break and do some stretching!",
    remind_later: "Remind in 5 minutes",
    stretch_now: "Stretch now",
    guide_title: "Stretching Guide",
};

const KO: Messages = Messages {
    title: "자세 알림이",
    break_time: "휴식 시간",
    break_time_desc: "잠시 휴식을 취하고 스트레칭을 해보세요!",
    remind_later: "5분 후에 알림",
    stretch_now: "지금 스트레칭",
    guide_title: "스트레칭 가이드",
};

pub fn messages(language: Language) -> &'static Messages {
    match language {
        Language::En => &EN,
        Language::Ko => &KO,
    }
}
