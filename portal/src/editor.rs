use crate::descriptor::{Matcher, ServiceDescriptor, UNREGISTERED};
use crate::manager::ServicesManager;
use crate::registry::err::RegErr;
use crate::validate::validate;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use validator::ValidationErrors;

/// Attribute names an external directory can release to services.  The edit
/// form lists them so an administrator picks from what actually exists.
pub trait AttributeRepository: Send + Sync {
    fn possible_attribute_names(&self) -> Vec<String>;
}

/// A fixed-map repository for tests and local wiring.
pub struct StubAttributeRepository {
    attributes: HashMap<String, Vec<String>>,
}

impl StubAttributeRepository {
    pub fn new(attributes: HashMap<String, Vec<String>>) -> Self {
        Self { attributes }
    }
}

impl Default for StubAttributeRepository {
    fn default() -> Self {
        let mut attributes = HashMap::new();
        attributes.insert("test".to_string(), vec!["test".to_string()]);
        Self { attributes }
    }
}

impl AttributeRepository for StubAttributeRepository {
    fn possible_attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.attributes.keys().cloned().collect();
        names.sort();
        names
    }
}

/// One edit-form submission.  `is_new` marks an add rather than an edit and
/// forces the sentinel id so the store assigns one.
#[derive(Debug, Clone)]
pub struct Submission {
    pub descriptor: ServiceDescriptor,
    pub is_new: bool,
}

/// Everything the form needs to render: the attribute listings and the page
/// title.
#[derive(Debug, Clone, Serialize)]
pub struct FormView {
    pub available_attributes: Vec<String>,
    pub available_username_attributes: Vec<String>,
    pub page_title: String,
}

const PAGE_TITLE: &str = "editServiceView";

/// Outcome of a submission.  Rejection is an expected result, not an error:
/// the submitted values come back (post-normalization) together with the
/// violations and a fresh form view for re-rendering.
#[derive(Debug)]
pub enum SubmitOutcome {
    Saved(ServiceDescriptor),
    Rejected {
        descriptor: ServiceDescriptor,
        errors: ValidationErrors,
        form: FormView,
    },
}

impl SubmitOutcome {
    pub fn saved(&self) -> Option<&ServiceDescriptor> {
        match self {
            SubmitOutcome::Saved(descriptor) => Some(descriptor),
            SubmitOutcome::Rejected { .. } => None,
        }
    }
}

/// Align the declared variant with what the pattern text says.  A caret
/// prefix marks a regular expression no matter which production variant was
/// picked; a declared regex without one falls back to glob.  Fixtures are
/// test doubles and keep whatever they declare.
pub fn normalize(descriptor: &mut ServiceDescriptor) {
    match descriptor.matcher {
        Matcher::Literal | Matcher::Glob if descriptor.pattern.starts_with('^') => {
            descriptor.matcher = Matcher::Regex;
        }
        Matcher::Regex if !descriptor.pattern.starts_with('^') => {
            descriptor.matcher = Matcher::Glob;
        }
        _ => {}
    }
}

/// The administrative edit flow around the registry: normalize the
/// submitted variant, validate against the current listing, persist on a
/// clean outcome.
pub struct ServiceEditor {
    manager: Arc<ServicesManager>,
    attributes: Arc<dyn AttributeRepository>,
}

impl ServiceEditor {
    pub fn new(manager: Arc<ServicesManager>, attributes: Arc<dyn AttributeRepository>) -> Self {
        Self {
            manager,
            attributes,
        }
    }

    /// Err is reserved for persistence failures; a submission that fails
    /// validation comes back as [`SubmitOutcome::Rejected`].
    pub async fn submit(&self, submission: Submission) -> Result<SubmitOutcome, RegErr> {
        let Submission {
            mut descriptor,
            is_new,
        } = submission;
        if is_new {
            descriptor.id = UNREGISTERED;
        }
        normalize(&mut descriptor);

        let errors = validate(&descriptor, &self.manager.services());
        if !errors.is_empty() {
            debug!(
                "submission for '{}' rejected on {} field(s)",
                descriptor.name,
                errors.field_errors().len()
            );
            return Ok(SubmitOutcome::Rejected {
                descriptor,
                errors,
                form: self.form_view(),
            });
        }

        let stored = self.manager.save(descriptor).await?;
        Ok(SubmitOutcome::Saved(stored))
    }

    /// Recompute the listings the form offers.  The username attribute pool
    /// is the same directory pool today.
    pub fn form_view(&self) -> FormView {
        let names = self.attributes.possible_attribute_names();
        FormView {
            available_attributes: names.clone(),
            available_username_attributes: names,
            page_title: PAGE_TITLE.to_string(),
        }
    }
}
