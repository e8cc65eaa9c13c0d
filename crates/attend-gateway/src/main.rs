use std::{net::SocketAddr, sync::Arc};

use anyhow::Result as AnyResult;
use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{Method, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use qrcode::{QrCode, render::svg};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgPool, Row, postgres::PgRow};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use attend_core::{
    Event, PendingPayment, PendingPayments, PollOutcome, RsvpSubmission, models::parse_event_id,
    poll_status,
};
use attend_platform::{
    DeleteEventForm, EventCreated, EventDeleted, EventForm, LightningClient, Mailer,
    PaymentStatusResponse, RateClient, RsvpAccepted, RsvpForm, ServiceConfig, build_http_client,
    connect_database, init_schema, issue_invoice,
};

mod error;
mod html;
mod ics;

use error::ApiError;
use html::{EventGroup, PaymentPage, RsvpEntry};

const LATEST_EVENTS_LIMIT: i64 = 10;

#[derive(Clone)]
struct AppState {
    pool: PgPool,
    payments: Arc<PendingPayments>,
    lightning: LightningClient,
    rates: RateClient,
    mailer: Mailer,
    admin_pin: String,
    fiat_currency: String,
    redirect_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdminQuery {
    admin_pin: Option<String>,
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "attend_gateway=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:8080")?;
    let pool = connect_database(&config.database_url).await?;
    init_schema(&pool).await?;

    let http = build_http_client()?;
    let lightning = LightningClient::new(
        http.clone(),
        &config.strike_api_url,
        &config.strike_api_key,
    );
    let rates = RateClient::new(http.clone(), &config.rate_api_url, &config.fiat_currency);
    let mailer = Mailer::new(http, config.mail.clone());
    if !mailer.enabled() {
        info!("mail settings absent, RSVP notifications disabled");
    }

    let state = AppState {
        pool,
        payments: Arc::new(PendingPayments::new()),
        lightning,
        rates,
        mailer,
        admin_pin: config.admin_pin.clone(),
        fiat_currency: config.fiat_currency.clone(),
        redirect_url: config.redirect_url.clone(),
    };

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/events", get(list_events))
        .route("/events/{event_id}", get(event_calendar))
        .route("/events/rsvp", post(submit_rsvp))
        .route("/payment-status/{invoice_id}", get(payment_status))
        .route("/create-event", post(create_event))
        .route("/delete-event", post(delete_event))
        .route("/list-rsvps", get(list_rsvps))
        .layer(cors_layer())
        .with_state(state);

    let addr: SocketAddr = config.http_addr.parse()?;
    info!("gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

// Any origin; the verbs and headers the browser clients use.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<Event>>, ApiError> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, description, event_date, start_time, end_time, price, location, created_at
        FROM events
        ORDER BY event_date DESC, start_time DESC
        LIMIT $1
        "#,
    )
    .bind(LATEST_EVENTS_LIMIT)
    .fetch_all(&state.pool)
    .await?;

    let mut events = Vec::with_capacity(rows.len());
    for row in rows {
        events.push(event_from_row(&row)?);
    }

    Ok(Json(events))
}

async fn event_calendar(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Response, ApiError> {
    let event_id = parse_event_id(&event_id)?;
    let event = fetch_event(&state.pool, event_id)
        .await?
        .ok_or(ApiError::NotFound("event not found"))?;

    let body = ics::build_event_ics(&event, Utc::now());
    let headers = [
        (header::CONTENT_TYPE, "text/calendar".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename={}",
                ics::attachment_filename(&event.title)
            ),
        ),
    ];

    Ok((headers, body).into_response())
}

async fn submit_rsvp(
    State(state): State<AppState>,
    Form(form): Form<RsvpForm>,
) -> Result<Response, ApiError> {
    let rsvp = form.validate()?;
    let event = fetch_event(&state.pool, rsvp.event_id)
        .await?
        .ok_or(ApiError::NotFound("event not found"))?;

    if event.price > Decimal::ZERO {
        return priced_rsvp(&state, &event, rsvp).await;
    }

    commit_rsvp(&state, &event, &rsvp)
        .await
        .map_err(ApiError::Database)?;

    Ok(match &state.redirect_url {
        Some(base) => Redirect::to(&format!(
            "{base}/?rsvp-success=true&event-id={}",
            rsvp.event_id
        ))
        .into_response(),
        None => (
            StatusCode::CREATED,
            Json(RsvpAccepted {
                message: "RSVP submitted successfully".to_string(),
                rsvp,
            }),
        )
            .into_response(),
    })
}

/// Priced path: issue the invoice, park the RSVP against it, and hand the
/// client a payment page that polls for settlement.
async fn priced_rsvp(
    state: &AppState,
    event: &Event,
    rsvp: RsvpSubmission,
) -> Result<Response, ApiError> {
    let issued = issue_invoice(&state.rates, &state.lightning, event.price)
        .await
        .map_err(|err| {
            error!("invoice issuing failed for event {}: {err}", event.id);
            ApiError::Upstream(format!("Could not generate invoice - {err}"))
        })?;

    state
        .payments
        .insert(PendingPayment::new(
            issued.invoice_id.clone(),
            event.price,
            rsvp,
        ))
        .await;
    info!(
        "invoice {} issued for event {} ({} pending)",
        issued.invoice_id,
        event.id,
        state.payments.len().await
    );

    let qr_svg = render_qr_svg(&issued.ln_invoice)?;
    let page = html::payment_page(&PaymentPage {
        price: event.price,
        currency: &state.fiat_currency,
        qr_svg: &qr_svg,
        ln_invoice: &issued.ln_invoice,
        invoice_id: &issued.invoice_id,
        event_id: event.id,
        redirect_url: state.redirect_url.as_deref(),
    });

    Ok(Html(page).into_response())
}

/// Client-driven settlement poll. Unknown invoices report unpaid rather
/// than erroring; a commit failure is logged and never surfaces, the poll
/// response stays `paid: true`.
async fn payment_status(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Json<PaymentStatusResponse> {
    let outcome = poll_status(&state.payments, &state.lightning, &invoice_id).await;
    let paid = outcome.paid();

    if let PollOutcome::Commit(payment) = outcome {
        commit_paid_rsvp(&state, &invoice_id, payment).await;
    }

    Json(PaymentStatusResponse { paid })
}

async fn commit_paid_rsvp(state: &AppState, invoice_id: &str, payment: PendingPayment) {
    let event = match fetch_event(&state.pool, payment.rsvp.event_id).await {
        Ok(Some(event)) => event,
        Ok(None) => {
            error!(
                "invoice {invoice_id}: event {} vanished before paid RSVP commit",
                payment.rsvp.event_id
            );
            return;
        }
        Err(err) => {
            error!("invoice {invoice_id}: event lookup failed before commit: {err}");
            return;
        }
    };

    match commit_rsvp(state, &event, &payment.rsvp).await {
        Ok(rsvp_id) => info!("invoice {invoice_id}: paid RSVP {rsvp_id} committed"),
        Err(err) => error!("invoice {invoice_id}: paid RSVP commit failed: {err}"),
    }
}

/// Durable insert plus the best-effort admin notification. Mail failures
/// are logged and swallowed; they never block persistence.
async fn commit_rsvp(
    state: &AppState,
    event: &Event,
    rsvp: &RsvpSubmission,
) -> Result<i64, sqlx::Error> {
    if let Err(err) = state
        .mailer
        .notify_rsvp(&event.title, event.date, &rsvp.name, &rsvp.email)
        .await
    {
        warn!("RSVP notification mail failed: {err:#}");
    }

    sqlx::query_scalar::<_, i64>(
        "INSERT INTO rsvps (event_id, name, email) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(rsvp.event_id)
    .bind(&rsvp.name)
    .bind(&rsvp.email)
    .fetch_one(&state.pool)
    .await
}

async fn create_event(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
    Form(form): Form<EventForm>,
) -> Result<Response, ApiError> {
    check_admin(
        &state.admin_pin,
        admin_pin_from(form.admin_pin.as_deref(), query.admin_pin.as_deref()),
    )?;
    let draft = form.validate()?;

    let event_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO events (title, description, event_date, start_time, end_time, price, location)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(draft.date)
    .bind(draft.start_time)
    .bind(draft.end_time)
    .bind(draft.price)
    .bind(&draft.location)
    .fetch_one(&state.pool)
    .await?;

    info!("event {event_id} created");

    Ok(match &state.redirect_url {
        Some(base) => {
            Redirect::to(&format!("{base}?create-event-success=true&event-id={event_id}"))
                .into_response()
        }
        None => (
            StatusCode::CREATED,
            Json(EventCreated {
                message: "Event created successfully".to_string(),
                event_id,
            }),
        )
            .into_response(),
    })
}

async fn delete_event(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
    Form(form): Form<DeleteEventForm>,
) -> Result<Response, ApiError> {
    check_admin(
        &state.admin_pin,
        admin_pin_from(form.admin_pin.as_deref(), query.admin_pin.as_deref()),
    )?;
    let event_id = parse_event_id(&form.event_id)?;

    sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(event_id)
        .execute(&state.pool)
        .await?;

    info!("event {event_id} deleted");

    Ok(match &state.redirect_url {
        Some(base) => {
            Redirect::to(&format!("{base}/?delete-event-success=true&event-id={event_id}"))
                .into_response()
        }
        None => Json(EventDeleted {
            message: "Event deleted successfully".to_string(),
            event_id,
        })
        .into_response(),
    })
}

async fn list_rsvps(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> Result<Html<String>, ApiError> {
    check_admin(&state.admin_pin, query.admin_pin.as_deref())?;

    let rows = sqlx::query(
        r#"
        SELECT e.id AS event_id, e.title, e.event_date, r.name, r.email, r.created_at
        FROM events e
        LEFT JOIN rsvps r ON e.id = r.event_id
        ORDER BY e.event_date DESC, r.created_at DESC
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let mut joined = Vec::with_capacity(rows.len());
    for row in rows {
        joined.push(RsvpJoinRow {
            event_id: row.try_get("event_id")?,
            title: row.try_get("title")?,
            date: row.try_get("event_date")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
        });
    }

    Ok(Html(html::rsvp_list_page(&group_rsvps(joined))))
}

struct RsvpJoinRow {
    event_id: i64,
    title: String,
    date: chrono::NaiveDate,
    name: Option<String>,
    email: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

// Groups join rows per event in first-seen order; events without RSVPs
// keep an empty group.
fn group_rsvps(rows: Vec<RsvpJoinRow>) -> Vec<EventGroup> {
    let mut groups: Vec<EventGroup> = Vec::new();

    for row in rows {
        let index = match groups.iter().position(|g| g.event_id == row.event_id) {
            Some(index) => index,
            None => {
                groups.push(EventGroup {
                    event_id: row.event_id,
                    title: row.title.clone(),
                    date: row.date,
                    rsvps: Vec::new(),
                });
                groups.len() - 1
            }
        };

        if let (Some(name), Some(email), Some(created_at)) = (row.name, row.email, row.created_at)
        {
            groups[index].rsvps.push(RsvpEntry {
                name,
                email,
                created_at,
            });
        }
    }

    groups
}

// The body PIN wins over the query-string PIN, as in the original gate.
fn admin_pin_from<'a>(body: Option<&'a str>, query: Option<&'a str>) -> Option<&'a str> {
    body.or(query)
}

fn check_admin(required: &str, provided: Option<&str>) -> Result<(), ApiError> {
    if pin_matches(required, provided) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

fn pin_matches(required: &str, provided: Option<&str>) -> bool {
    provided.is_some_and(|pin| !pin.is_empty() && pin == required)
}

fn render_qr_svg(data: &str) -> Result<String, ApiError> {
    let code = QrCode::new(data.as_bytes())
        .map_err(|err| ApiError::Upstream(format!("Could not encode payment QR - {err}")))?;
    Ok(code
        .render::<svg::Color>()
        .min_dimensions(240, 240)
        .build())
}

async fn fetch_event(pool: &PgPool, event_id: i64) -> Result<Option<Event>, ApiError> {
    let row = sqlx::query(
        r#"
        SELECT id, title, description, event_date, start_time, end_time, price, location, created_at
        FROM events
        WHERE id = $1
        "#,
    )
    .bind(event_id)
    .fetch_optional(pool)
    .await?;

    row.map(|row| event_from_row(&row)).transpose()
}

fn event_from_row(row: &PgRow) -> Result<Event, ApiError> {
    Ok(Event {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        date: row.try_get("event_date")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        price: row.try_get("price")?,
        location: row.try_get("location")?,
        created_at: row.try_get("created_at")?,
    })
}
