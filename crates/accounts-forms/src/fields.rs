//! Form field definitions and field-level cleaning.
//!
//! A [`FormFieldDef`] describes one input: its [`FormFieldType`], widget,
//! label and help text. [`clean_field_value`] turns the raw submitted string
//! into a [`FieldValue`] or a list of error messages.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// HTML input widgets used by the account forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetType {
    /// `<input type="text">`.
    TextInput,
    /// `<input type="email">`.
    EmailInput,
    /// `<input type="password">`. Never re-displays the submitted value.
    PasswordInput,
    /// `<input type="checkbox">`.
    CheckboxInput,
}

impl WidgetType {
    /// Returns the value of the HTML `type` attribute.
    pub const fn input_type(self) -> &'static str {
        match self {
            Self::TextInput => "text",
            Self::EmailInput => "email",
            Self::PasswordInput => "password",
            Self::CheckboxInput => "checkbox",
        }
    }
}

/// The type of a form field and its type-specific constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormFieldType {
    /// Free text.
    Char {
        /// Minimum length in characters.
        min_length: Option<usize>,
        /// Maximum length in characters.
        max_length: Option<usize>,
        /// Trim leading and trailing whitespace before validating.
        strip: bool,
    },
    /// An email address, trimmed and syntax-checked.
    Email {
        /// Maximum length in characters.
        max_length: Option<usize>,
    },
    /// A checkbox; missing means `false`.
    Boolean,
}

impl FormFieldType {
    /// A stripped text field with no length limits.
    pub const fn text() -> Self {
        Self::Char {
            min_length: None,
            max_length: None,
            strip: true,
        }
    }

    /// A stripped text field with a maximum length.
    pub const fn text_max(max_length: usize) -> Self {
        Self::Char {
            min_length: None,
            max_length: Some(max_length),
            strip: true,
        }
    }

    /// An unstripped text field, for passwords.
    pub const fn password() -> Self {
        Self::Char {
            min_length: None,
            max_length: None,
            strip: false,
        }
    }
}

/// A cleaned field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// A text value (possibly stripped).
    Text(String),
    /// A checkbox state.
    Bool(bool),
    /// An optional field left blank.
    Empty,
}

/// Describes a single form field.
#[derive(Debug, Clone)]
pub struct FormFieldDef {
    /// The field name (HTML `name` attribute).
    pub name: String,
    /// The field type, controlling cleaning.
    pub field_type: FormFieldType,
    /// Whether a value must be supplied.
    pub required: bool,
    /// Human-readable label.
    pub label: String,
    /// Help text shown under the input.
    pub help_text: String,
    /// The widget used to render the field.
    pub widget: WidgetType,
    /// Focus this input when the page loads.
    pub autofocus: bool,
    /// Placeholder text.
    pub placeholder: Option<String>,
    /// Error messages overriding the defaults, keyed by code.
    pub error_messages: HashMap<String, String>,
}

impl FormFieldDef {
    /// Creates a required field with the default widget for its type.
    ///
    /// The label defaults to the name with underscores replaced and the first
    /// letter capitalized (`first_name` becomes "First name").
    pub fn new(name: impl Into<String>, field_type: FormFieldType) -> Self {
        let name = name.into();
        let widget = default_widget_for_field_type(&field_type);
        let required = !matches!(field_type, FormFieldType::Boolean);
        let label = capfirst(&name.replace('_', " "));
        Self {
            name,
            field_type,
            required,
            label,
            help_text: String::new(),
            widget,
            autofocus: false,
            placeholder: None,
            error_messages: HashMap::new(),
        }
    }

    /// Sets whether this field is required.
    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = text.into();
        self
    }

    /// Sets the widget.
    #[must_use]
    pub fn widget(mut self, widget: WidgetType) -> Self {
        self.widget = widget;
        self
    }

    /// Focuses this input on page load.
    #[must_use]
    pub fn autofocus(mut self) -> Self {
        self.autofocus = true;
        self
    }

    /// Sets the placeholder text.
    #[must_use]
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Overrides the message for an error code (`required`, `invalid`, ...).
    #[must_use]
    pub fn error_message(mut self, code: impl Into<String>, msg: impl Into<String>) -> Self {
        self.error_messages.insert(code.into(), msg.into());
        self
    }

    fn message(&self, code: &str, default: &str) -> String {
        self.error_messages
            .get(code)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

/// Returns the default widget for a field type.
pub const fn default_widget_for_field_type(field_type: &FormFieldType) -> WidgetType {
    match field_type {
        FormFieldType::Char { .. } => WidgetType::TextInput,
        FormFieldType::Email { .. } => WidgetType::EmailInput,
        FormFieldType::Boolean => WidgetType::CheckboxInput,
    }
}

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").expect("valid regex")
});

/// Returns `true` if `value` looks like an email address.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// Cleans a raw submitted value.
///
/// 1. Strip (text fields with `strip`, email fields).
/// 2. Required check.
/// 3. Type-specific validation: length limits, email syntax.
pub fn clean_field_value(
    field: &FormFieldDef,
    raw: Option<&str>,
) -> Result<FieldValue, Vec<String>> {
    if field.field_type == FormFieldType::Boolean {
        let checked = raw.is_some_and(|v| {
            matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
        });
        if field.required && !checked {
            return Err(vec![field.message("required", "This field is required.")]);
        }
        return Ok(FieldValue::Bool(checked));
    }

    let raw = raw.unwrap_or("");
    let value = match field.field_type {
        FormFieldType::Char { strip: false, .. } => raw,
        _ => raw.trim(),
    };

    if value.is_empty() {
        if field.required {
            return Err(vec![field.message("required", "This field is required.")]);
        }
        return Ok(FieldValue::Empty);
    }

    let mut errors = Vec::new();
    let length = value.chars().count();

    let (min_length, max_length) = match &field.field_type {
        FormFieldType::Char {
            min_length,
            max_length,
            ..
        } => (*min_length, *max_length),
        FormFieldType::Email { max_length } => (None, *max_length),
        FormFieldType::Boolean => (None, None),
    };

    if let Some(min) = min_length {
        if length < min {
            errors.push(format!(
                "Ensure this value has at least {min} characters (it has {length})."
            ));
        }
    }
    if let Some(max) = max_length {
        if length > max {
            errors.push(format!(
                "Ensure this value has at most {max} characters (it has {length})."
            ));
        }
    }
    if matches!(field.field_type, FormFieldType::Email { .. }) && !is_valid_email(value) {
        errors.push(field.message("invalid", "Enter a valid email address."));
    }

    if errors.is_empty() {
        Ok(FieldValue::Text(value.to_string()))
    } else {
        Err(errors)
    }
}

fn capfirst(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
