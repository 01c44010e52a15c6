// RequestBuilder - chainable builder for MessageRequest

use super::types::Message;
use super::wire::{MessageRequest, ToolSchema, WireMessage, WireRole, to_wire};

pub struct RequestBuilder {
    model: String,
    system: Option<String>,
    messages: Vec<WireMessage>,
    tools: Option<Vec<ToolSchema>>,
    max_tokens: u32,
    temperature: Option<f32>,
    top_p: Option<f32>,
    top_k: Option<u32>,
}

impl RequestBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages: Vec::new(),
            tools: None,
            max_tokens: 4096,
            temperature: None,
            top_p: None,
            top_k: None,
        }
    }

    /// Append a whole conversation; system messages land in the system field
    pub fn conversation(mut self, messages: &[Message]) -> Self {
        let (system, wire) = to_wire(messages);
        if let Some(system) = system {
            self.system = Some(match self.system.take() {
                Some(existing) => format!("{}\n\n{}", existing, system),
                None => system,
            });
        }
        self.messages.extend(wire);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = if tools.is_empty() { None } else { Some(tools) };
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn top_p(mut self, top_p: Option<f32>) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn top_k(mut self, top_k: Option<u32>) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn build(self) -> Result<MessageRequest, &'static str> {
        if self.messages.is_empty() {
            return Err("messages cannot be empty");
        }

        // Validate: first message must be user role
        if self.messages.first().map(|m| &m.role) != Some(&WireRole::User) {
            return Err("first message must have user role");
        }

        Ok(MessageRequest {
            model: self.model,
            system: self.system,
            messages: self.messages,
            tools: self.tools,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
        })
    }
}
