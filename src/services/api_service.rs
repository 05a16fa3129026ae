use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer, Result as ActixResult};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::sensors::registry::{series_key, SensorMetadata, SensorRegistry};
use crate::services::collector::Collector;
use crate::storage::DataStore;
use crate::utils::error::ModbusError;

/// Address given either as a JSON number or as a decimal/hex string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AddressField {
    Number(u64),
    Text(String),
}

impl AddressField {
    fn as_text(&self) -> String {
        match self {
            AddressField::Number(value) => value.to_string(),
            AddressField::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddSensorRequest {
    pub sensor_type: String,
    pub sensor_name: String,
    pub address: AddressField,
}

#[derive(Debug, Serialize)]
pub struct TestReading {
    pub series_key: String,
    pub value: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddSensorResponse {
    pub success: bool,
    pub sensor: SensorMetadata,
    pub readings: Vec<TestReading>,
}

#[derive(Debug, Serialize)]
pub struct ActiveSensor {
    pub name: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub address: u8,
    pub channel_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    fn from_error(error: &ModbusError) -> Self {
        Self {
            success: false,
            error: error.to_string(),
            code: error.code().to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct ApiServiceState {
    pub registry: Arc<SensorRegistry>,
    pub store: Arc<DataStore>,
    pub collector: Arc<Collector>,
}

impl ApiServiceState {
    pub fn new(registry: Arc<SensorRegistry>, store: Arc<DataStore>, collector: Arc<Collector>) -> Self {
        Self {
            registry,
            store,
            collector,
        }
    }
}

pub struct ApiService {
    state: ApiServiceState,
    server_handle: Option<actix_web::dev::ServerHandle>,
}

impl ApiService {
    pub fn new(state: ApiServiceState) -> Self {
        Self {
            state,
            server_handle: None,
        }
    }

    pub async fn start(&mut self, bind_address: &str, port: u16) -> Result<(), ModbusError> {
        info!("🌐 Starting HTTP API server on {}:{}", bind_address, port);

        let state_data = web::Data::new(self.state.clone());
        let server = HttpServer::new(move || {
            App::new()
                .app_data(state_data.clone())
                .wrap(Logger::default())
                .configure(routes)
        })
        .workers(1)
        .bind((bind_address, port))?
        .run();

        self.server_handle = Some(server.handle());

        tokio::spawn(async move {
            if let Err(e) = server.await {
                error!("❌ HTTP API server error: {}", e);
            }
        });

        info!("✅ HTTP API server listening on {}:{}", bind_address, port);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), ModbusError> {
        info!("🛑 Stopping HTTP API server...");

        if let Some(handle) = self.server_handle.take() {
            tokio::select! {
                _ = handle.stop(true) => {
                    info!("✅ HTTP API server stopped gracefully");
                }
                _ = tokio::time::sleep(tokio::time::Duration::from_secs(10)) => {
                    warn!("⚠️  HTTP API server shutdown timeout, forcing stop");
                    handle.stop(false).await;
                }
            }
        }

        Ok(())
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/data", web::get().to(get_data))
        .route("/add_sensor", web::post().to(add_sensor))
        .route("/active_sensors", web::get().to(active_sensors))
        .route("/sensor_metadata", web::get().to(sensor_metadata))
        .route("/stop", web::get().to(stop_collector))
        .route("/status", web::get().to(status));
}

// GET /data
async fn get_data(state: web::Data<ApiServiceState>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.store.dump()))
}

// POST /add_sensor - register and test-read every channel
async fn add_sensor(
    request: web::Json<AddSensorRequest>,
    state: web::Data<ApiServiceState>,
) -> ActixResult<HttpResponse> {
    let address = request.address.as_text();
    info!(
        "📝 Add sensor request: '{}' [{}] at {}",
        request.sensor_name, request.sensor_type, address
    );

    let metadata = match state
        .registry
        .add_sensor(&request.sensor_type, &request.sensor_name, &address)
    {
        Ok(metadata) => metadata,
        Err(e) => return Ok(error_response(&e)),
    };

    let mut readings = Vec::with_capacity(metadata.channel_count);
    for channel in 0..metadata.channel_count {
        let key = series_key(&metadata.name, channel, metadata.channel_count);
        let reading = match state.registry.try_read(&metadata.name, channel).await {
            Ok(value) => TestReading {
                series_key: key,
                value: Some(value),
                error: None,
            },
            Err(e) => {
                warn!("⚠️  Test read of '{}' channel {} failed: {}", metadata.name, channel, e);
                TestReading {
                    series_key: key,
                    value: None,
                    error: Some(e.to_string()),
                }
            }
        };
        readings.push(reading);
    }

    Ok(HttpResponse::Ok().json(AddSensorResponse {
        success: true,
        sensor: metadata,
        readings,
    }))
}

// GET /active_sensors
async fn active_sensors(state: web::Data<ApiServiceState>) -> ActixResult<HttpResponse> {
    let sensors: Vec<ActiveSensor> = state
        .registry
        .metadata()
        .into_iter()
        .map(|sensor| ActiveSensor {
            name: sensor.name,
            sensor_type: sensor.sensor_type,
            address: sensor.address,
            channel_count: sensor.channel_count,
        })
        .collect();
    Ok(HttpResponse::Ok().json(sensors))
}

// GET /sensor_metadata
async fn sensor_metadata(state: web::Data<ApiServiceState>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.registry.metadata()))
}

// GET /stop
async fn stop_collector(state: web::Data<ApiServiceState>) -> ActixResult<HttpResponse> {
    state.collector.stop();
    Ok(HttpResponse::Ok().body("Stopped"))
}

// GET /status
async fn status(state: web::Data<ApiServiceState>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "collector": state.collector.status(),
        "sensors": state.registry.len(),
        "failed_reads": state.registry.failed_reads(),
        "total_readings": state.store.total_readings(),
        "version": crate::VERSION,
        "timestamp": Utc::now(),
    })))
}

fn error_response(error: &ModbusError) -> HttpResponse {
    let body = ErrorResponse::from_error(error);
    if error.is_client_error() {
        warn!("❌ Rejected request: {}", error);
        HttpResponse::BadRequest().json(body)
    } else {
        error!("❌ Request failed: {}", error);
        HttpResponse::InternalServerError().json(body)
    }
}
