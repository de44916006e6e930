//! Localized copy for the chat widget.

use super::Language;
use crate::gateway::ErrorKind;
use crate::session::{Rejection, StatusKind};

/// Locale-specific labels re-rendered whenever the language changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiStrings {
    pub title: &'static str,
    pub placeholder: &'static str,
    pub send_label: &'static str,
    pub clear_label: &'static str,
    pub user_label: &'static str,
    pub assistant_label: &'static str,
    pub welcome: &'static str,
}

struct Catalog {
    ui: UiStrings,
    ready: &'static str,
    sending: &'static str,
    replied: &'static str,
    cleared: &'static str,
    disabled: &'static str,
    reachable: &'static str,
    unreachable: &'static str,
    busy: &'static str,
    empty: &'static str,
    too_long: &'static str,
    degraded: &'static str,
    timed_out: &'static str,
    network: &'static str,
    rate_limited: &'static str,
    server: &'static str,
    http: &'static str,
    apology: &'static str,
}

const ZH: Catalog = Catalog {
    ui: UiStrings {
        title: "AI 助手",
        placeholder: "输入您的问题…",
        send_label: "发送",
        clear_label: "清空",
        user_label: "你",
        assistant_label: "助手",
        welcome: "你好！我是 AI 助手，有什么可以帮您？",
    },
    ready: "就绪",
    sending: "正在发送…",
    replied: "已回复",
    cleared: "对话已清空",
    disabled: "聊天暂不可用",
    reachable: "服务已连接",
    unreachable: "无法连接服务，聊天已停用",
    busy: "请等待上一条消息完成",
    empty: "消息不能为空",
    too_long: "消息过长，最多 {max} 个字符",
    degraded: "回复格式异常，已显示原始内容",
    timed_out: "请求超时错误，请稍后再试",
    network: "网络连接错误，请检查网络后重试",
    rate_limited: "请求过于频繁，请稍后再试",
    server: "服务器内部错误，请稍后再试",
    http: "请求失败错误",
    apology: "抱歉，",
};

const EN: Catalog = Catalog {
    ui: UiStrings {
        title: "AI Assistant",
        placeholder: "Type your message…",
        send_label: "Send",
        clear_label: "Clear",
        user_label: "You",
        assistant_label: "Assistant",
        welcome: "Hello! I'm the AI assistant. How can I help you?",
    },
    ready: "Ready",
    sending: "Sending…",
    replied: "Replied",
    cleared: "Conversation cleared",
    disabled: "Chat is currently unavailable",
    reachable: "Connected",
    unreachable: "Cannot reach the service; chat disabled",
    busy: "Please wait for the previous message to finish",
    empty: "Message cannot be empty",
    too_long: "Message too long (max {max} characters)",
    degraded: "Unexpected reply format; showing raw content",
    timed_out: "Request timed out, please try again later",
    network: "Network error, please check your connection and retry",
    rate_limited: "Too many requests, please try again later",
    server: "Server error, please try again later",
    http: "Request failed",
    apology: "Sorry: ",
};

const JA: Catalog = Catalog {
    ui: UiStrings {
        title: "AI アシスタント",
        placeholder: "メッセージを入力…",
        send_label: "送信",
        clear_label: "クリア",
        user_label: "あなた",
        assistant_label: "アシスタント",
        welcome: "こんにちは！AI アシスタントです。ご用件をどうぞ。",
    },
    ready: "準備完了",
    sending: "送信中…",
    replied: "返信しました",
    cleared: "会話をクリアしました",
    disabled: "チャットは現在利用できません",
    reachable: "接続しました",
    unreachable: "サービスに接続できません。チャットを無効にしました",
    busy: "前のメッセージの完了をお待ちください",
    empty: "メッセージを入力してください",
    too_long: "メッセージが長すぎます（最大 {max} 文字）",
    degraded: "応答形式が不正なため、元の内容を表示しています",
    timed_out: "リクエストがタイムアウトしました。しばらくしてから再試行してください",
    network: "ネットワークエラーです。接続を確認して再試行してください",
    rate_limited: "リクエストが多すぎます。しばらくしてから再試行してください",
    server: "サーバーエラーです。しばらくしてから再試行してください",
    http: "リクエストに失敗しました",
    apology: "申し訳ありません。",
};

fn catalog(lang: Language) -> &'static Catalog {
    match lang {
        Language::Zh => &ZH,
        Language::En => &EN,
        Language::Ja => &JA,
    }
}

impl UiStrings {
    pub fn for_language(lang: Language) -> &'static UiStrings {
        &catalog(lang).ui
    }
}

/// Status line text.
pub fn status_text(kind: &StatusKind, lang: Language) -> String {
    let c = catalog(lang);
    match kind {
        StatusKind::Ready => c.ready.to_string(),
        StatusKind::Sending => c.sending.to_string(),
        StatusKind::Replied => c.replied.to_string(),
        StatusKind::Cleared => c.cleared.to_string(),
        StatusKind::Disabled => c.disabled.to_string(),
        StatusKind::Reachable => c.reachable.to_string(),
        StatusKind::Unreachable => c.unreachable.to_string(),
        StatusKind::Rejected(r) => rejection_text(r, lang),
        StatusKind::TimedOut => c.timed_out.to_string(),
        StatusKind::Failed(kind) => error_kind_text(*kind, lang).to_string(),
    }
}

/// Validation message shown when `send` refuses input.
pub fn rejection_text(rejection: &Rejection, lang: Language) -> String {
    let c = catalog(lang);
    match rejection {
        Rejection::Busy => c.busy.to_string(),
        Rejection::Disabled => c.disabled.to_string(),
        Rejection::Empty => c.empty.to_string(),
        Rejection::TooLong { max } => c.too_long.replace("{max}", &max.to_string()),
    }
}

/// Short description of a failure category.
pub fn error_kind_text(kind: ErrorKind, lang: Language) -> &'static str {
    let c = catalog(lang);
    match kind {
        ErrorKind::Validation => c.empty,
        ErrorKind::Network => c.network,
        ErrorKind::RateLimited => c.rate_limited,
        ErrorKind::ServerError => c.server,
        ErrorKind::GenericHttp => c.http,
        ErrorKind::MalformedResponse => c.degraded,
    }
}

/// Transcript text for a failed request: the category description plus any detail the backend sent.
pub fn failure_message(status: &StatusKind, detail: Option<&str>, lang: Language) -> String {
    let c = catalog(lang);
    let mut text = format!("{}{}", c.apology, status_text(status, lang));
    if let Some(d) = detail.map(str::trim).filter(|d| !d.is_empty()) {
        text.push_str(&format!(" ({})", d));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zh_error_copy_names_the_category() {
        let net = status_text(&StatusKind::Failed(ErrorKind::Network), Language::Zh);
        assert!(net.contains("网络") && net.contains("错误"));
        let server = status_text(&StatusKind::Failed(ErrorKind::ServerError), Language::Zh);
        assert!(server.contains("服务器") && server.contains("错误"));
        let rate = status_text(&StatusKind::Failed(ErrorKind::RateLimited), Language::Zh);
        assert!(rate.contains("请求") && rate.contains("频繁"));
        assert!(status_text(&StatusKind::TimedOut, Language::Zh).contains("超时"));
    }

    #[test]
    fn too_long_includes_limit() {
        let s = rejection_text(&Rejection::TooLong { max: 10 }, Language::En);
        assert_eq!(s, "Message too long (max 10 characters)");
    }

    #[test]
    fn failure_message_appends_detail() {
        let s = failure_message(
            &StatusKind::Failed(ErrorKind::GenericHttp),
            Some("Unsupported language"),
            Language::En,
        );
        assert_eq!(s, "Sorry: Request failed (Unsupported language)");
        let s = failure_message(&StatusKind::Failed(ErrorKind::Network), Some("  "), Language::En);
        assert!(!s.contains('('));
    }

    #[test]
    fn every_language_has_labels() {
        for lang in Language::ALL {
            let ui = UiStrings::for_language(lang);
            assert!(!ui.placeholder.is_empty());
            assert!(!ui.assistant_label.is_empty());
            assert!(!ui.welcome.is_empty());
        }
    }
}
