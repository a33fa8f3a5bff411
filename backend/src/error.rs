//! Error handling for the Smart City Telemetry platform
//!
//! Provides consistent error responses in English and French

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::PeriodError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Collection errors
    #[error("Weather adapter error: {0}")]
    Adapter(String),

    #[error("Unknown sensor: {0}")]
    UnknownSensor(i64),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_fr: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Report lifecycle errors
    #[error("Report generation failed: {0}")]
    Generation(String),

    #[error("Report is not ready for download")]
    ReportNotReady,

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // Transport errors
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Message codec error: {0}")]
    Codec(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<PeriodError> for AppError {
    fn from(err: PeriodError) -> Self {
        AppError::Validation {
            field: err.field().to_string(),
            message: err.to_string(),
            message_fr: err.message_fr(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|f| f.to_string())
            .unwrap_or_default();
        AppError::Validation {
            message: format!("Invalid value for {}", field),
            message_fr: format!("Valeur invalide pour {}", field),
            field,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    pub message_fr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::UnknownSensor(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation { .. }
            | AppError::ReportNotReady
            | AppError::Codec(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidStateTransition(_) => StatusCode::CONFLICT,
            AppError::Adapter(_)
            | AppError::Generation(_)
            | AppError::Channel(_)
            | AppError::Configuration(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for failures of the storage or transport layer, as opposed to
    /// problems with the data being processed. Database data exceptions
    /// (SQLSTATE class 22) and constraint violations (class 23) count as data.
    pub fn is_infrastructure(&self) -> bool {
        match self {
            AppError::DatabaseError(sqlx::Error::Database(db)) => !db
                .code()
                .is_some_and(|code| code.starts_with("22") || code.starts_with("23")),
            AppError::DatabaseError(_)
            | AppError::Channel(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => true,
            _ => false,
        }
    }

    fn detail(&self) -> ErrorDetail {
        let (code, message, message_fr, field) = match self {
            AppError::Adapter(msg) => (
                "ADAPTER_ERROR",
                format!("Weather data could not be collected: {}", msg),
                format!("Les données météo n'ont pas pu être collectées : {}", msg),
                None,
            ),
            AppError::UnknownSensor(id) => (
                "UNKNOWN_SENSOR",
                format!("Sensor {} does not exist", id),
                format!("Le capteur {} n'existe pas", id),
                None,
            ),
            AppError::Validation {
                field,
                message,
                message_fr,
            } => (
                "VALIDATION_ERROR",
                message.clone(),
                message_fr.clone(),
                Some(field.clone()),
            ),
            AppError::NotFound(resource) => (
                "NOT_FOUND",
                format!("{} not found", resource),
                format!("{} introuvable", resource),
                None,
            ),
            AppError::Generation(msg) => (
                "GENERATION_ERROR",
                format!("Report generation failed: {}", msg),
                format!("La génération du rapport a échoué : {}", msg),
                None,
            ),
            AppError::ReportNotReady => (
                "REPORT_NOT_READY",
                "The report is not finished yet and cannot be downloaded".to_string(),
                "Le rapport n'est pas encore terminé et ne peut pas être téléchargé".to_string(),
                None,
            ),
            AppError::InvalidStateTransition(msg) => (
                "INVALID_STATE_TRANSITION",
                msg.clone(),
                format!("Transition d'état invalide : {}", msg),
                None,
            ),
            AppError::Channel(_) => (
                "CHANNEL_ERROR",
                "The message channel is unavailable".to_string(),
                "Le canal de messages est indisponible".to_string(),
                None,
            ),
            AppError::Codec(msg) => (
                "CODEC_ERROR",
                format!("Malformed message: {}", msg),
                format!("Message mal formé : {}", msg),
                None,
            ),
            AppError::Configuration(msg) => (
                "CONFIGURATION_ERROR",
                format!("Configuration error: {}", msg),
                format!("Erreur de configuration : {}", msg),
                None,
            ),
            AppError::DatabaseError(_) => (
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                "Une erreur de base de données est survenue".to_string(),
                None,
            ),
            AppError::Internal(msg) => (
                "INTERNAL_ERROR",
                msg.clone(),
                "Erreur interne du serveur".to_string(),
                None,
            ),
            AppError::InternalError(_) => (
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
                "Erreur interne du serveur".to_string(),
                None,
            ),
        };

        ErrorDetail {
            code: code.to_string(),
            message,
            message_fr,
            field,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_detail = self.detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
