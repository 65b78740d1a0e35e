//! `BaseForm` and the `Form` trait.
//!
//! [`BaseForm`] owns a list of field definitions and handles binding,
//! field-level cleaning, error collection and template context generation.
//! Account forms wrap a `BaseForm` and add their cross-field and
//! database-backed checks on top, exposing the wrapped form through the
//! [`Form`] trait so views can render any of them the same way.

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::fields::{clean_field_value, FieldValue, FormFieldDef, WidgetType};

/// Raw submitted data: field name to value.
pub type FormData = HashMap<String, String>;

/// Collected errors: field name (or [`NON_FIELD_ERRORS`]) to messages.
pub type FormErrors = HashMap<String, Vec<String>>;

/// The error key for errors not tied to a single field.
pub const NON_FIELD_ERRORS: &str = "__all__";

/// Access to the `BaseForm` inside a concrete form.
pub trait Form: Send + Sync {
    /// Returns the wrapped form.
    fn base(&self) -> &BaseForm;

    /// Returns the wrapped form mutably.
    fn base_mut(&mut self) -> &mut BaseForm;

    /// Binds submitted data.
    fn bind(&mut self, data: &FormData) {
        self.base_mut().bind(data);
    }

    /// Returns the collected errors.
    fn errors(&self) -> &FormErrors {
        self.base().errors()
    }

    /// Returns the template context for rendering the form.
    fn as_context(&self) -> Value {
        self.base().as_context()
    }
}

/// A general-purpose form built from field definitions.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use accounts_forms::{BaseForm, FormFieldDef, FormFieldType};
///
/// let mut form = BaseForm::new(vec![
///     FormFieldDef::new("email", FormFieldType::Email { max_length: Some(255) }),
/// ]);
/// let data: HashMap<String, String> =
///     [("email".to_string(), "a@example.com".to_string())].into_iter().collect();
/// form.bind(&data);
/// assert!(form.full_clean());
/// assert_eq!(form.cleaned_str("email"), Some("a@example.com"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct BaseForm {
    fields: Vec<FormFieldDef>,
    initial: HashMap<String, String>,
    bound: bool,
    raw_data: HashMap<String, Option<String>>,
    errors: FormErrors,
    cleaned_data: HashMap<String, FieldValue>,
}

impl BaseForm {
    /// Creates an unbound form with the given fields, in display order.
    pub fn new(fields: Vec<FormFieldDef>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Returns the field definitions.
    pub fn fields(&self) -> &[FormFieldDef] {
        &self.fields
    }

    /// Returns the field called `name`.
    pub fn field(&self, name: &str) -> Option<&FormFieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns `true` if the form has a field called `name`.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Sets the value shown for `name` on an unbound form.
    pub fn set_initial(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.initial.insert(name.into(), value.into());
    }

    /// Binds submitted data, clearing previous errors and cleaned data.
    pub fn bind(&mut self, data: &FormData) {
        self.bound = true;
        self.errors.clear();
        self.cleaned_data.clear();
        self.raw_data = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), data.get(&f.name).cloned()))
            .collect();
    }

    /// Returns `true` once data has been bound.
    pub const fn is_bound(&self) -> bool {
        self.bound
    }

    /// Runs field-level cleaning. Returns `true` if every field cleaned.
    ///
    /// Cross-field checks run afterwards and report through [`BaseForm::add_error`].
    pub fn full_clean(&mut self) -> bool {
        if !self.bound {
            return false;
        }
        self.errors.clear();
        self.cleaned_data.clear();

        for field in &self.fields {
            let raw = self.raw_data.get(&field.name).and_then(Option::as_deref);
            match clean_field_value(field, raw) {
                Ok(value) => {
                    self.cleaned_data.insert(field.name.clone(), value);
                }
                Err(messages) => {
                    self.errors.insert(field.name.clone(), messages);
                }
            }
        }

        self.errors.is_empty()
    }

    /// Records an error on `field`, or a non-field error when `None`.
    ///
    /// The field's cleaned value is discarded.
    pub fn add_error(&mut self, field: Option<&str>, message: impl Into<String>) {
        let key = field.unwrap_or(NON_FIELD_ERRORS);
        self.cleaned_data.remove(key);
        self.errors
            .entry(key.to_string())
            .or_default()
            .push(message.into());
    }

    /// Returns `true` if the form is bound and has no errors.
    pub fn is_valid(&self) -> bool {
        self.bound && self.errors.is_empty()
    }

    /// Returns all errors.
    pub const fn errors(&self) -> &FormErrors {
        &self.errors
    }

    /// Returns the errors of one field.
    pub fn field_errors(&self, name: &str) -> &[String] {
        self.errors.get(name).map_or(&[], Vec::as_slice)
    }

    /// Returns the non-field errors.
    pub fn non_field_errors(&self) -> &[String] {
        self.field_errors(NON_FIELD_ERRORS)
    }

    /// Returns `true` if `name` has at least one error.
    pub fn has_error(&self, name: &str) -> bool {
        !self.field_errors(name).is_empty()
    }

    /// Returns a cleaned text value. Blank optional fields give `None`.
    pub fn cleaned_str(&self, name: &str) -> Option<&str> {
        match self.cleaned_data.get(name) {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns a cleaned text value, or `""` when absent.
    pub fn cleaned_or_empty(&self, name: &str) -> &str {
        self.cleaned_str(name).unwrap_or("")
    }

    /// Returns a cleaned checkbox value (`false` when absent).
    pub fn cleaned_bool(&self, name: &str) -> bool {
        matches!(self.cleaned_data.get(name), Some(FieldValue::Bool(true)))
    }

    /// Returns the value to display in the input for `field`.
    fn display_value(&self, field: &FormFieldDef) -> String {
        if field.widget == WidgetType::PasswordInput {
            return String::new();
        }
        if self.bound {
            self.raw_data
                .get(&field.name)
                .cloned()
                .flatten()
                .unwrap_or_default()
        } else {
            self.initial.get(&field.name).cloned().unwrap_or_default()
        }
    }

    /// Builds the template context.
    ///
    /// ```json
    /// { "fields": [{ "name", "label", "input_type", "value", "checked",
    ///                "errors", "help_text", "required", "autofocus",
    ///                "placeholder" }],
    ///   "non_field_errors": [], "is_bound": true, "has_errors": false }
    /// ```
    pub fn as_context(&self) -> Value {
        let fields: Vec<Value> = self
            .fields
            .iter()
            .map(|field| {
                let value = self.display_value(field);
                let checked = field.widget == WidgetType::CheckboxInput
                    && matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on");
                json!({
                    "name": field.name,
                    "label": field.label,
                    "input_type": field.widget.input_type(),
                    "value": value,
                    "checked": checked,
                    "errors": self.field_errors(&field.name),
                    "help_text": field.help_text,
                    "required": field.required,
                    "autofocus": field.autofocus,
                    "placeholder": field.placeholder.clone().unwrap_or_default(),
                })
            })
            .collect();

        json!({
            "fields": fields,
            "non_field_errors": self.non_field_errors(),
            "is_bound": self.bound,
            "has_errors": !self.errors.is_empty(),
        })
    }
}

impl Form for BaseForm {
    fn base(&self) -> &BaseForm {
        self
    }

    fn base_mut(&mut self) -> &mut BaseForm {
        self
    }
}
