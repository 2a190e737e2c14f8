//! Console command model
//!
//! A [`Command`] is the console-facing sibling of a route: a colon-namespaced
//! invocation name (`users:index`) bound to a handler, with typed arguments
//! and options forming the contract for an external argv parser.
//!
//! Commands are created through a
//! [`RouteCollector`](crate::collector::RouteCollector), which dual-registers
//! a console route for them. Attaching an HTTP verb to a command that was not
//! created through a collector is a configuration error and fails fast with a
//! `LOGIC` error.

use crate::handler::HandlerRef;
use crate::route::Method;
use crate::{RouterError, RouterResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inferred type of an argument or option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Free-form string value (the default)
    #[default]
    String,
    /// Flag-style boolean value
    Bool,
}

/// A positional console argument.
///
/// A trailing `?` in the spec string marks the argument optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    /// Argument name, without the optional marker
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Whether the argument must be supplied
    pub required: bool,
    /// Default value for optional arguments
    pub default: Option<Value>,
    /// Value type, `string` unless stated otherwise
    pub value_type: ValueType,
}

impl Argument {
    /// Parse an argument spec string (`"file"` required, `"file?"` optional).
    pub fn parse(spec: &str, description: impl Into<String>) -> Self {
        let (name, required) = match spec.strip_suffix('?') {
            Some(name) => (name, false),
            None => (spec, true),
        };
        Self {
            name: name.to_string(),
            description: description.into(),
            required,
            default: None,
            value_type: ValueType::String,
        }
    }

    /// Attach a default value, used when an optional argument is omitted.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// A named console option (`--format=json`, `--verbose`, `-v`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOption {
    /// Option name, without dashes
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Whether the option must be supplied
    pub required: bool,
    /// Default value; plain boolean flags default to `false`
    pub default: Option<Value>,
    /// `bool` when the spec carries no `=default`, `string` otherwise
    pub value_type: ValueType,
    /// Single-letter shortcut, empty when absent
    pub shortcut: String,
}

impl CommandOption {
    /// Parse an option spec string: `"verbose"` is a boolean flag defaulting
    /// to `false`, `"format=json"` is a string option defaulting to `json`.
    pub fn parse(spec: &str, description: impl Into<String>) -> Self {
        let (name, default, value_type) = match spec.split_once('=') {
            Some((name, default)) => (name, Some(Value::from(default)), ValueType::String),
            None => (spec, Some(Value::Bool(false)), ValueType::Bool),
        };
        Self {
            name: name.to_string(),
            description: description.into(),
            required: false,
            default,
            value_type,
            shortcut: String::new(),
        }
    }

    /// Attach a single-letter shortcut.
    pub fn with_shortcut(mut self, shortcut: char) -> Self {
        self.shortcut = shortcut.to_string();
        self
    }
}

/// A declarative binding of a console invocation name to a handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    name: String,
    handler: HandlerRef,
    description: String,
    arguments: Vec<Argument>,
    options: Vec<CommandOption>,
    /// Name of the HTTP route this command was declared jointly with
    route_name: Option<String>,
    /// HTTP attachments requested during registration; materialized into
    /// routes by the collector once the callback returns.
    #[serde(skip)]
    http_attachments: Vec<(Method, String)>,
    /// Set only for commands created through a collector.
    #[serde(skip)]
    attached: bool,
}

impl Command {
    /// Create a detached command. Detached commands can describe arguments
    /// and options but cannot dual-register HTTP routes.
    pub fn new(
        name: impl Into<String>,
        handler: impl Into<HandlerRef>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            handler: handler.into(),
            description: description.into(),
            arguments: Vec::new(),
            options: Vec::new(),
            route_name: None,
            http_attachments: Vec::new(),
            attached: false,
        }
    }

    pub(crate) fn new_attached(
        name: impl Into<String>,
        handler: impl Into<HandlerRef>,
        description: impl Into<String>,
    ) -> Self {
        let mut command = Self::new(name, handler, description);
        command.attached = true;
        command
    }

    /// Command name (colon-namespaced, e.g. `users:index`).
    pub fn command_name(&self) -> &str {
        &self.name
    }

    /// Handler reference.
    pub fn handler_ref(&self) -> &HandlerRef {
        &self.handler
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Ordered positional arguments.
    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Ordered options.
    pub fn options(&self) -> &[CommandOption] {
        &self.options
    }

    /// Name of the HTTP route this command was declared jointly with, if any.
    pub fn route_name(&self) -> Option<&str> {
        self.route_name.as_deref()
    }

    pub(crate) fn set_route_name(&mut self, name: impl Into<String>) {
        self.route_name = Some(name.into());
    }

    pub(crate) fn take_http_attachments(&mut self) -> Vec<(Method, String)> {
        std::mem::take(&mut self.http_attachments)
    }

    /// Declare a positional argument (`"file"` required, `"file?"` optional).
    pub fn argument(&mut self, spec: &str, description: &str) -> &mut Self {
        self.arguments.push(Argument::parse(spec, description));
        self
    }

    /// Declare a positional argument with a default value.
    pub fn argument_with_default(
        &mut self,
        spec: &str,
        description: &str,
        default: impl Into<Value>,
    ) -> &mut Self {
        self.arguments
            .push(Argument::parse(spec, description).with_default(default));
        self
    }

    /// Declare an option (`"verbose"` boolean flag, `"format=json"` string
    /// option with default).
    pub fn option(&mut self, spec: &str, description: &str) -> &mut Self {
        self.options.push(CommandOption::parse(spec, description));
        self
    }

    /// Declare an option with a single-letter shortcut.
    pub fn option_with_shortcut(
        &mut self,
        spec: &str,
        description: &str,
        shortcut: char,
    ) -> &mut Self {
        self.options
            .push(CommandOption::parse(spec, description).with_shortcut(shortcut));
        self
    }

    /// Dual-register an HTTP route sharing this command's handler.
    ///
    /// Only legal on commands created through a collector; a detached command
    /// has no registration context to place the route in and fails fast.
    pub fn http(&mut self, method: Method, pattern: impl Into<String>) -> RouterResult<&mut Self> {
        if !self.attached {
            return Err(RouterError::logic(format!(
                "command '{}' was not created through a collector; cannot attach an HTTP route",
                self.name
            )));
        }
        self.http_attachments.push((method, pattern.into()));
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_argument_required_marker() {
        let required = Argument::parse("file", "input file");
        assert!(required.required);
        assert_eq!(required.name, "file");

        let optional = Argument::parse("file?", "input file");
        assert!(!optional.required);
        assert_eq!(optional.name, "file");
    }

    #[test]
    fn test_option_type_inference() {
        let flag = CommandOption::parse("verbose", "noisy output");
        assert_eq!(flag.value_type, ValueType::Bool);
        assert_eq!(flag.default, Some(json!(false)));

        let valued = CommandOption::parse("format=json", "output format");
        assert_eq!(valued.value_type, ValueType::String);
        assert_eq!(valued.default, Some(json!("json")));
        assert_eq!(valued.name, "format");
    }

    #[test]
    fn test_option_shortcut() {
        let option = CommandOption::parse("verbose", "noisy output").with_shortcut('v');
        assert_eq!(option.shortcut, "v");
    }

    #[test]
    fn test_command_builders() {
        let mut command = Command::new("users:index", "UserCommand::index", "list users");
        command
            .argument("filter?", "name filter")
            .option_with_shortcut("format=table", "output format", 'f');

        assert_eq!(command.command_name(), "users:index");
        assert_eq!(command.arguments().len(), 1);
        assert_eq!(command.options().len(), 1);
        assert!(!command.arguments()[0].required);
    }

    #[test]
    fn test_detached_http_attachment_is_logic_error() {
        let mut command = Command::new("users:index", "UserCommand::index", "list users");
        let err = command.http(Method::Get, "users").unwrap_err();
        assert_eq!(err.code, crate::RouterErrorCode::Logic);
    }

    #[test]
    fn test_attached_http_attachment_records() {
        let mut command = Command::new_attached("users:index", "UserCommand::index", "list");
        command.http(Method::Get, "users").unwrap();
        assert_eq!(
            command.take_http_attachments(),
            vec![(Method::Get, "users".to_string())]
        );
    }
}
