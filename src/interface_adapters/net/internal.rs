use crate::domain::{CollisionEvent, DamageError, DamageType, Vec3};
use crate::interface_adapters::http::error_response;
use crate::interface_adapters::state::AppState;
use crate::use_cases::{AuthorityCommand, DamageRequest};

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::warn;

#[derive(Debug, serde::Deserialize)]
pub struct CollisionRequest {
    // Projectile whose collision component fired.
    projectile_id: u64,
    // Struck entity, absent when the projectile hit static geometry.
    #[serde(default)]
    other_entity: Option<u64>,
    hit_position: Vec3,
    #[serde(default)]
    hit_normal: Vec3,
    #[serde(default)]
    impulse: Vec3,
}

#[derive(Debug, serde::Deserialize)]
pub struct DamageRequestBody {
    target: u64,
    amount: f32,
    #[serde(default)]
    damage_type: DamageType,
    // Character credited with the damage.
    instigator: u64,
    #[serde(default)]
    causer: Option<u64>,
}

#[derive(Debug, serde::Serialize)]
struct DamageResponse {
    // Target health after the damage was applied.
    applied: f32,
}

/// Collision events from the physics collaborator. Resolution happens on the next tick.
pub async fn collision_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CollisionRequest>,
) -> impl IntoResponse {
    if !(payload.hit_position.is_finite()
        && payload.hit_normal.is_finite()
        && payload.impulse.is_finite())
    {
        return error_response(StatusCode::BAD_REQUEST, "collision vectors must be finite");
    }

    let command = AuthorityCommand::Collision {
        projectile_id: payload.projectile_id,
        event: CollisionEvent {
            other_entity: payload.other_entity,
            hit_position: payload.hit_position,
            hit_normal: payload.hit_normal,
            impulse: payload.impulse,
        },
    };
    if state.command_tx.send(command).await.is_err() {
        warn!("command channel closed; collision dropped");
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "world unavailable");
    }
    StatusCode::ACCEPTED.into_response()
}

/// Damage application for other gameplay systems. Waits for the authority's answer.
pub async fn apply_damage_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DamageRequestBody>,
) -> impl IntoResponse {
    if !payload.amount.is_finite() {
        return error_response(StatusCode::BAD_REQUEST, "amount must be finite");
    }

    let (reply, rx) = oneshot::channel();
    let command = AuthorityCommand::ApplyDamage {
        request: DamageRequest {
            target: payload.target,
            amount: payload.amount,
            damage_type: payload.damage_type,
            instigator: payload.instigator,
            causer: payload.causer,
        },
        reply,
    };
    if state.command_tx.send(command).await.is_err() {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "world unavailable");
    }

    match rx.await {
        Ok(Ok(applied)) => (StatusCode::OK, Json(DamageResponse { applied })).into_response(),
        Ok(Err(DamageError::UnknownTarget(_))) => {
            error_response(StatusCode::NOT_FOUND, "target not found")
        }
        Ok(Err(DamageError::MissingInstigatorController)) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "instigator has no controller",
        ),
        Err(_) => error_response(StatusCode::SERVICE_UNAVAILABLE, "world unavailable"),
    }
}
