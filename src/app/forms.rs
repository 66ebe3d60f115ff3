use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::app::groups::GroupService;
use crate::domain::group::{self, Group};
use crate::domain::post::Post;
use crate::domain::user;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const IMAGE_TOO_LARGE: &str = "The uploaded file is too large.";

/// Field name to messages, serialized as `{"text": ["This field is required."]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    fn merge(&mut self, other: FormErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut form_errors = FormErrors::default();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                form_errors.add(&field.to_string(), message);
            }
        }
        form_errors
    }
}

/// Why a form could not be turned into cleaned data.
#[derive(Debug)]
pub enum FormRejection {
    Invalid(FormErrors),
    Failed(anyhow::Error),
}

impl From<anyhow::Error> for FormRejection {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(err)
    }
}

impl From<FormErrors> for FormRejection {
    fn from(errors: FormErrors) -> Self {
        Self::Invalid(errors)
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required").with_message(REQUIRED.into()));
    }
    Ok(())
}

fn valid_username(value: &str) -> Result<(), ValidationError> {
    if !user::is_valid_username(value) {
        return Err(ValidationError::new("invalid").with_message(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .into(),
        ));
    }
    Ok(())
}

fn valid_title(value: &str) -> Result<(), ValidationError> {
    not_blank(value)?;
    if value.chars().count() > group::TITLE_MAX_LEN {
        return Err(ValidationError::new("max_length").with_message(
            format!(
                "Ensure this value has at most {} characters.",
                group::TITLE_MAX_LEN
            )
            .into(),
        ));
    }
    Ok(())
}

fn valid_slug(value: &str) -> Result<(), ValidationError> {
    if !group::is_valid_slug(value) {
        return Err(ValidationError::new("invalid").with_message(
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub data: Bytes,
}

/// Raw post submission as read from a multipart body.
#[derive(Debug, Default, Validate)]
pub struct PostForm {
    #[validate(custom(function = "not_blank"))]
    pub text: String,
    pub group: Option<String>,
    pub image: Option<UploadedImage>,
}

#[derive(Debug)]
pub struct CleanedPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<UploadedImage>,
}

impl PostForm {
    pub async fn clean(
        self,
        groups: &GroupService,
        max_upload_bytes: usize,
    ) -> Result<CleanedPost, FormRejection> {
        let mut errors = match self.validate() {
            Ok(()) => FormErrors::default(),
            Err(errors) => FormErrors::from(errors),
        };

        let group_id = match self.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let found = match raw.parse::<i64>() {
                    Ok(id) => groups.get_group(id).await?.map(|group| group.id),
                    Err(_) => None,
                };
                if found.is_none() {
                    errors.add("group", INVALID_CHOICE);
                }
                found
            }
        };

        if let Some(image) = &self.image {
            errors.merge(check_image(image, max_upload_bytes));
        }

        if !errors.is_empty() {
            return Err(FormRejection::Invalid(errors));
        }

        Ok(CleanedPost {
            text: self.text,
            group_id,
            image: self.image,
        })
    }
}

/// Accepts only bytes that decode as one of the enabled image formats.
pub fn check_image(image: &UploadedImage, max_upload_bytes: usize) -> FormErrors {
    let mut errors = FormErrors::default();
    if image.data.len() > max_upload_bytes {
        errors.add("image", IMAGE_TOO_LARGE);
        return errors;
    }
    if let Err(err) = image::load_from_memory(&image.data) {
        tracing::debug!(error = %err, file_name = %image.file_name, "rejected upload");
        errors.add("image", INVALID_IMAGE);
    }
    errors
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CommentForm {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub text: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupForm {
    #[validate(custom(function = "valid_username"))]
    pub username: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password must be between 8 and 128 characters."
    ))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(
        min = 1,
        max = 128,
        message = "Password must be between 1 and 128 characters."
    ))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GroupForm {
    #[validate(custom(function = "valid_title"))]
    pub title: String,
    #[validate(custom(function = "valid_slug"))]
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

/// Description of one input, returned on GET so clients can build the form.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: &'static str,
    pub label: &'static str,
    pub help_text: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupChoice {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PostInitial {
    pub text: String,
    pub group: Option<i64>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostFormSpec {
    pub fields: Vec<FieldSpec>,
    pub group_choices: Vec<GroupChoice>,
    pub initial: PostInitial,
}

impl PostFormSpec {
    pub fn new(groups: Vec<Group>, post: Option<&Post>) -> Self {
        let initial = post
            .map(|post| PostInitial {
                text: post.text.clone(),
                group: post.group_id,
                image: post.image.clone(),
            })
            .unwrap_or_default();

        Self {
            fields: post_fields(),
            group_choices: groups
                .into_iter()
                .map(|group| GroupChoice {
                    id: group.id,
                    title: group.title,
                })
                .collect(),
            initial,
        }
    }
}

pub fn post_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec {
            name: "text",
            kind: "text",
            label: "Текст",
            help_text: "Введите текст",
            required: true,
        },
        FieldSpec {
            name: "group",
            kind: "choice",
            label: "Группа",
            help_text: "Введите группу",
            required: false,
        },
        FieldSpec {
            name: "image",
            kind: "image",
            label: "Image",
            help_text: "",
            required: false,
        },
    ]
}

pub fn comment_fields() -> Vec<FieldSpec> {
    vec![FieldSpec {
        name: "text",
        kind: "text",
        label: "Текст",
        help_text: "Введите текст комментария",
        required: true,
    }]
}

pub fn login_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec {
            name: "username",
            kind: "text",
            label: "Username",
            help_text: "",
            required: true,
        },
        FieldSpec {
            name: "password",
            kind: "password",
            label: "Password",
            help_text: "",
            required: true,
        },
    ]
}
