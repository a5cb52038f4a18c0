//! Short user-facing strings.
//!
//! Internal errors, provider status codes and stack traces never go through
//! here; only these fixed texts reach the chat.

/// Kinds of user-visible status and error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserMessage {
    UnknownTool,
    MissingArguments,
    InvalidArguments,
    ToolFailed,
    ProvidersExhausted,
    /// The tool needs a quoted image or audio message.
    MissingMedia,
    Cancelled,
    /// An async job never reported back.
    TimedOut,
    /// Collapsed ACK for a batch of `n` requests.
    WorkingOnMany(usize),
}

/// Render a user message in the requested language, falling back to English.
pub fn user_message(message: UserMessage, lang: &str) -> String {
    let lang = lang.split(['-', '_']).next().unwrap_or("en").to_ascii_lowercase();
    match lang.as_str() {
        "es" => spanish(message),
        _ => english(message),
    }
}

fn english(message: UserMessage) -> String {
    match message {
        UserMessage::UnknownTool => "Sorry, I can't do that yet.".to_string(),
        UserMessage::MissingArguments => {
            "I need a bit more detail to do that. Could you rephrase?".to_string()
        }
        UserMessage::InvalidArguments => "Something about that request didn't look right.".to_string(),
        UserMessage::ToolFailed => "Sorry, something went wrong. Please try again.".to_string(),
        UserMessage::ProvidersExhausted => {
            "All services for this are busy right now. Please try again later.".to_string()
        }
        UserMessage::MissingMedia => {
            "Reply to the image or audio you want me to use.".to_string()
        }
        UserMessage::Cancelled => "Cancelled.".to_string(),
        UserMessage::TimedOut => {
            "That took too long and was stopped. Please try again.".to_string()
        }
        UserMessage::WorkingOnMany(n) => format!("Working on your {n} requests..."),
    }
}

fn spanish(message: UserMessage) -> String {
    match message {
        UserMessage::UnknownTool => "Lo siento, todavía no puedo hacer eso.".to_string(),
        UserMessage::MissingArguments => {
            "Necesito un poco más de detalle. ¿Puedes reformularlo?".to_string()
        }
        UserMessage::InvalidArguments => "Algo en esa solicitud no parece correcto.".to_string(),
        UserMessage::ToolFailed => "Lo siento, algo salió mal. Inténtalo de nuevo.".to_string(),
        UserMessage::ProvidersExhausted => {
            "Todos los servicios están ocupados. Inténtalo más tarde.".to_string()
        }
        UserMessage::MissingMedia => {
            "Responde a la imagen o el audio que quieres que use.".to_string()
        }
        UserMessage::Cancelled => "Cancelado.".to_string(),
        UserMessage::TimedOut => {
            "Eso tardó demasiado y se detuvo. Inténtalo de nuevo.".to_string()
        }
        UserMessage::WorkingOnMany(n) => format!("Trabajando en tus {n} solicitudes..."),
    }
}
