use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Map, Value};
use tracing::info;

use crate::{
    allocator::{allocate, reconcile_counter},
    error::AppError,
    models::{
        ChatLogged, ChatMessage, Created, Message, NewChat, NewTask, Role, TaskChanges,
        TaskRecord, TripRecord, TripRecorded,
    },
    notifier::Event,
    state::AppState,
    utils::{
        DATE_FORMAT, TRIP_REQUIRED_FIELDS, arrival_date, departure_date, missing_fields,
        required_id, stay_days, text_field, timestamp,
    },
};

type Payload<T> = Result<Json<T>, JsonRejection>;

pub async fn health_handler() -> &'static str {
    "Test successful!"
}

pub async fn list_tasks_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let subtree = state.store().get(state.tasks.root()).await?;

    Ok(Json(subtree.unwrap_or(Value::Null)))
}

pub async fn create_task_handler(
    State(state): State<Arc<AppState>>,
    payload: Payload<NewTask>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;

    let task = payload
        .task
        .filter(|task| !task.is_empty())
        .ok_or_else(|| AppError::Validation("Task is required".to_string()))?;

    let id = allocate(state.store(), &state.tasks, state.config.id_strategy, 1).await?;
    state
        .tasks
        .insert(state.store(), id, &TaskRecord::new(id, task))
        .await?;

    info!(id, "Task added");
    state.notifier.notify(Event::Added).await;

    Ok((
        StatusCode::CREATED,
        Json(Created {
            message: "Task added",
            id,
        }),
    ))
}

pub async fn update_task_handler(
    State(state): State<Arc<AppState>>,
    payload: Payload<TaskChanges>,
) -> Result<Json<Message>, AppError> {
    let Json(changes) = payload?;
    let id = required_id(changes.id.as_ref())?;

    update_task(&state, id, changes).await
}

pub async fn update_task_at_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<u64>, PathRejection>,
    payload: Payload<TaskChanges>,
) -> Result<Json<Message>, AppError> {
    let Path(id) = id?;
    let Json(changes) = payload?;

    update_task(&state, id, changes).await
}

pub async fn delete_task_handler(
    State(state): State<Arc<AppState>>,
    payload: Payload<TaskChanges>,
) -> Result<Json<Message>, AppError> {
    let Json(target) = payload?;
    let id = required_id(target.id.as_ref())?;

    delete_task(&state, id).await
}

pub async fn delete_task_at_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<Message>, AppError> {
    let Path(id) = id?;

    delete_task(&state, id).await
}

async fn update_task(
    state: &AppState,
    id: u64,
    changes: TaskChanges,
) -> Result<Json<Message>, AppError> {
    let located = state
        .tasks
        .locate(state.store(), id)
        .await?
        .ok_or(AppError::NotFound("Task not found"))?;

    let record = TaskRecord::merged(id, &located.value, changes);
    state
        .store()
        .update(&located.path, &record.into_fields())
        .await?;

    info!(id, "Task updated");
    state.notifier.notify(Event::Edited).await;

    Ok(Json(Message {
        message: "Task updated",
    }))
}

async fn delete_task(state: &AppState, id: u64) -> Result<Json<Message>, AppError> {
    let located = state
        .tasks
        .locate(state.store(), id)
        .await?
        .ok_or(AppError::NotFound("Task not found"))?;

    state.store().delete(&located.path).await?;

    let strategy = state.config.id_strategy;
    if strategy.tracks_counter() {
        let counter = reconcile_counter(state.store(), &state.tasks, strategy).await?;
        info!(id, counter, "Task deleted");
    } else {
        info!(id, "Task deleted");
    }

    state.notifier.notify(Event::Deleted).await;

    Ok(Json(Message {
        message: "Task deleted",
    }))
}

fn found(subtree: Option<Value>) -> Result<Json<Value>, AppError> {
    subtree.map(Json).ok_or(AppError::NotFound("No data found."))
}

pub async fn list_chat_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    found(state.store().get(state.chat.root()).await?)
}

pub async fn log_chat_handler(
    State(state): State<Arc<AppState>>,
    payload: Payload<NewChat>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;

    let prompt = payload
        .user_prompt
        .filter(|prompt| !prompt.is_empty())
        .ok_or_else(|| AppError::Validation("User prompt is required".to_string()))?;

    let id = allocate(state.store(), &state.chat, state.config.id_strategy, 2).await?;
    let reply_id = id + 1;
    let timestamp = timestamp();

    let exchange = [
        ChatMessage {
            id,
            role: Role::User,
            parts: prompt,
            timestamp: timestamp.clone(),
        },
        ChatMessage {
            id: reply_id,
            role: Role::Model,
            parts: payload.model_reply.unwrap_or_default(),
            timestamp,
        },
    ];

    for message in &exchange {
        state.chat.insert(state.store(), message.id, message).await?;
    }

    info!(id, reply_id, "Chat logged");

    Ok((
        StatusCode::CREATED,
        Json(ChatLogged {
            message: "Chat logged",
            id,
            reply_id,
        }),
    ))
}

pub async fn list_trips_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    found(state.store().get(state.trips.root()).await?)
}

pub async fn record_trip_handler(
    State(state): State<Arc<AppState>>,
    payload: Payload<Map<String, Value>>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;

    let missing = missing_fields(&payload, &TRIP_REQUIRED_FIELDS);
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let no_of_stayed_days = stay_days(payload.get("no_of_stayed_days"))?;
    let arrival = arrival_date(payload.get("arrive_date"))?;
    let departure = departure_date(arrival, no_of_stayed_days)?;

    let id = allocate(state.store(), &state.trips, state.config.id_strategy, 1).await?;

    let trip = TripRecord {
        id,
        destination: text_field(&payload, "destination"),
        arrive_time: text_field(&payload, "arrive_time"),
        no_of_stayed_days,
        arrival_date: arrival.format(DATE_FORMAT).to_string(),
        departure_date: departure.format(DATE_FORMAT).to_string(),
        leave_time: text_field(&payload, "leave_time"),
        timestamp: timestamp(),
    };

    state.trips.insert(state.store(), id, &trip).await?;
    info!(id, departure = %trip.departure_date, "Trip recorded");

    Ok((
        StatusCode::CREATED,
        Json(TripRecorded {
            message: "Trip information successfully recorded.",
            data: trip,
        }),
    ))
}
