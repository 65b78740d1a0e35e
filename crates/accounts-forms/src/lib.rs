//! # accounts-forms
//!
//! A small form layer: field definitions, binding of submitted data,
//! field-level cleaning and error collection, and a JSON context for
//! rendering forms with Tera.
//!
//! Forms with database-backed or cross-field checks wrap a [`BaseForm`], call
//! [`BaseForm::full_clean`] and then report further problems through
//! [`BaseForm::add_error`].

pub mod fields;
pub mod form;

pub use fields::{FieldValue, FormFieldDef, FormFieldType, WidgetType};
pub use form::{BaseForm, Form, FormData, FormErrors, NON_FIELD_ERRORS};
