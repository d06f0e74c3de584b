//! Payloads and responses of the API.

use crate::model::district::DEFAULT_TOP_N;
use crate::model::error::DatasetError;
use log::warn;
use poem_openapi::types::{ParseFromJSON, ToJSON, Type};
use poem_openapi::Object;
use poem_openapi::{payload::Json, ApiResponse, Tags};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

#[derive(Tags)]
pub enum ApiTags {
    Dataset,
    Analysis,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object)]
pub struct ErrorMessage {
    pub msg: String,
}

#[derive(ApiResponse)]
pub enum GetResponse<T: Type + ParseFromJSON + ToJSON + Send + Sync> {
    #[oai(status = 200)]
    Ok(Json<T>),

    #[oai(status = 400)]
    BadRequest(Json<ErrorMessage>),

    #[oai(status = 404)]
    NotFound(Json<ErrorMessage>),
}

impl<T: Type + ParseFromJSON + ToJSON + Send + Sync> GetResponse<T> {
    pub fn ok(t: T) -> Self {
        Self::Ok(Json(t))
    }

    pub fn bad_request(msg: String) -> Self {
        Self::BadRequest(Json(ErrorMessage { msg }))
    }

    pub fn not_found(msg: String) -> Self {
        Self::NotFound(Json(ErrorMessage { msg }))
    }

    pub fn from_error(e: DatasetError) -> Self {
        let msg = e.to_string();
        warn!("{}", msg);
        if e.is_not_found() {
            Self::not_found(msg)
        } else {
            Self::bad_request(msg)
        }
    }
}

#[derive(ApiResponse)]
pub enum PostResponse<T: Type + ParseFromJSON + ToJSON + Send + Sync> {
    #[oai(status = 201)]
    Created(Json<T>),

    #[oai(status = 400)]
    BadRequest(Json<ErrorMessage>),
}

impl<T: Type + ParseFromJSON + ToJSON + Send + Sync> PostResponse<T> {
    pub fn created(t: T) -> Self {
        Self::Created(Json(t))
    }

    pub fn bad_request(msg: String) -> Self {
        warn!("{}", msg);
        Self::BadRequest(Json(ErrorMessage { msg }))
    }
}

#[derive(ApiResponse)]
pub enum DeleteResponse {
    #[oai(status = 204)]
    NoContent,

    #[oai(status = 400)]
    BadRequest(Json<ErrorMessage>),

    #[oai(status = 404)]
    NotFound(Json<ErrorMessage>),
}

impl DeleteResponse {
    pub fn from_error(e: DatasetError) -> Self {
        let msg = e.to_string();
        warn!("{}", msg);
        if e.is_not_found() {
            Self::NotFound(Json(ErrorMessage { msg }))
        } else {
            Self::BadRequest(Json(ErrorMessage { msg }))
        }
    }
}

/// The year and state a district level analysis is about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Selection {
    #[validate(range(min = 1, max = 9999, message = "The year should be between 1 and 9999."))]
    pub year: i64,

    #[validate(length(min = 1, max = 255, message = "The length of state should be between 1 and 255."))]
    pub state: String,

    #[validate(range(min = 5, max = 25, message = "The number of districts should be between 5 and 25."))]
    pub top_n: Option<usize>,
}

impl Selection {
    pub fn new(year: i64, state: String, top_n: Option<usize>) -> Result<Self, String> {
        let selection = Selection { year, state, top_n };
        selection.validate().map_err(format_validation_errors)?;
        Ok(selection)
    }

    /// Defaults to 10, validated to stay within 5..=25.
    pub fn top_n(&self) -> usize {
        self.top_n.unwrap_or(DEFAULT_TOP_N)
    }
}

pub fn format_validation_errors(e: ValidationErrors) -> String {
    let mut messages: Vec<String> = e
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| match &error.message {
                Some(message) => message.to_string(),
                None => format!("Invalid value for {}: {}", field, error.code),
            })
        })
        .collect();
    messages.sort();
    messages.join(" ")
}
