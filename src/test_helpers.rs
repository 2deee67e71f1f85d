use crate::{
    redemption::{
        FinalStatus,
        RecordId,
        RedemptionRequest,
        SensorReading,
    },
    service::{
        RedemptionService,
        ServiceError,
    },
};
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};

#[cfg(feature = "test-helpers")]
pub use stub_server::StubServer;

/// One call made against a [`ScriptedService`] or [`StubServer`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServiceCall {
    Create(RedemptionRequest),
    Check(RecordId),
    Update(RecordId, FinalStatus),
}

struct Script {
    create: Result<RecordId, ServiceError>,
    readings: VecDeque<Result<SensorReading, ServiceError>>,
    fallback: Result<SensorReading, ServiceError>,
    update: Result<(), ServiceError>,
    create_latency: Duration,
    check_latency: Duration,
    calls: Vec<ServiceCall>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            create: Ok(RecordId(1)),
            readings: VecDeque::new(),
            fallback: Ok(SensorReading::Unavailable),
            update: Ok(()),
            create_latency: Duration::ZERO,
            check_latency: Duration::ZERO,
            calls: Vec::new(),
        }
    }
}

/// In-memory redemption service replaying scripted answers.
///
/// Status queries pop from the scripted readings and fall back to
/// `Unavailable` (or the configured fallback) once they run out.
#[derive(Clone, Default)]
pub struct ScriptedService {
    script: Arc<Mutex<Script>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_created(self, id: RecordId) -> Self {
        self.script.lock().unwrap().create = Ok(id);
        self
    }

    pub fn with_create_error(self, err: ServiceError) -> Self {
        self.script.lock().unwrap().create = Err(err);
        self
    }

    pub fn with_readings(
        self,
        readings: impl IntoIterator<Item = Result<SensorReading, ServiceError>>,
    ) -> Self {
        self.script.lock().unwrap().readings.extend(readings);
        self
    }

    pub fn with_fallback(self, reading: Result<SensorReading, ServiceError>) -> Self {
        self.script.lock().unwrap().fallback = reading;
        self
    }

    pub fn with_failing_updates(self, err: ServiceError) -> Self {
        self.script.lock().unwrap().update = Err(err);
        self
    }

    pub fn with_create_latency(self, latency: Duration) -> Self {
        self.script.lock().unwrap().create_latency = latency;
        self
    }

    pub fn with_check_latency(self, latency: Duration) -> Self {
        self.script.lock().unwrap().check_latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn check_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ServiceCall::Check(_)))
            .count()
    }

    pub fn updates(&self) -> Vec<(RecordId, FinalStatus)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ServiceCall::Update(id, status) => Some((id, status)),
                _ => None,
            })
            .collect()
    }
}

impl RedemptionService for ScriptedService {
    async fn create_record(
        &self,
        request: RedemptionRequest,
    ) -> Result<RecordId, ServiceError> {
        let (result, latency) = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(ServiceCall::Create(request));
            (script.create.clone(), script.create_latency)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        result
    }

    async fn check_status(&self, id: RecordId) -> Result<SensorReading, ServiceError> {
        let (result, latency) = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(ServiceCall::Check(id));
            let next = match script.readings.pop_front() {
                Some(reading) => reading,
                None => script.fallback.clone(),
            };
            (next, script.check_latency)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        result
    }

    async fn update_status(
        &self,
        id: RecordId,
        status: FinalStatus,
    ) -> Result<(), ServiceError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(ServiceCall::Update(id, status));
        script.update.clone()
    }
}

#[cfg(feature = "test-helpers")]
mod stub_server {
    use super::ServiceCall;
    use crate::redemption::{
        FinalStatus,
        RecordId,
        RedemptionRequest,
    };
    use actix_web::{
        App,
        HttpResponse,
        HttpServer,
        dev::ServerHandle,
        http::StatusCode,
        web,
    };
    use serde::Deserialize;
    use std::{
        collections::VecDeque,
        io,
        net::TcpListener,
        sync::Mutex,
        thread::JoinHandle,
    };

    #[derive(Clone, Debug)]
    struct CannedResponse {
        status: u16,
        body: String,
    }

    impl CannedResponse {
        fn new(status: u16, body: impl Into<String>) -> Self {
            Self {
                status,
                body: body.into(),
            }
        }

        fn into_response(self) -> HttpResponse {
            let status =
                StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            HttpResponse::build(status)
                .content_type("application/json")
                .body(self.body)
        }
    }

    struct StubState {
        create: Mutex<CannedResponse>,
        sensor: Mutex<VecDeque<CannedResponse>>,
        sensor_fallback: Mutex<CannedResponse>,
        update: Mutex<CannedResponse>,
        calls: Mutex<Vec<ServiceCall>>,
    }

    #[derive(Deserialize)]
    struct UpdateBody {
        #[serde(rename = "Status")]
        status: FinalStatus,
    }

    /// The redemption service's HTTP surface served from canned responses.
    pub struct StubServer {
        base_url: String,
        state: web::Data<StubState>,
        server_handle: ServerHandle,
        server_thread: Option<JoinHandle<()>>,
    }

    impl StubServer {
        pub async fn start() -> io::Result<Self> {
            let listener = TcpListener::bind(("127.0.0.1", 0))?;
            let address = listener.local_addr()?;
            let base_url = format!("http://{}", address);
            let state = web::Data::new(StubState {
                create: Mutex::new(CannedResponse::new(200, r#"{"id": 1}"#)),
                sensor: Mutex::new(VecDeque::new()),
                sensor_fallback: Mutex::new(CannedResponse::new(
                    200,
                    r#"{"SensorResponse": null}"#,
                )),
                update: Mutex::new(CannedResponse::new(200, "{}")),
                calls: Mutex::new(Vec::new()),
            });

            tracing::info!("stub redemption service listening on {}", base_url);

            let server_state = state.clone();
            let server = HttpServer::new(move || {
                App::new()
                    .app_data(server_state.clone())
                    .route("/add_waste_prize", web::post().to(handle_create))
                    .route(
                        "/check_sensor_response/{id}",
                        web::get().to(handle_check),
                    )
                    .route("/update_status/{id}", web::put().to(handle_update))
            })
            .workers(1)
            .listen(listener)?
            .run();

            let server_handle = server.handle();
            let server_thread = std::thread::spawn(move || {
                let sys = actix_web::rt::System::new();
                let _ = sys.block_on(server);
            });

            Ok(Self {
                base_url,
                state,
                server_handle,
                server_thread: Some(server_thread),
            })
        }

        pub fn base_url(&self) -> &str {
            &self.base_url
        }

        pub fn respond_to_create(&self, status: u16, body: impl Into<String>) {
            *self.state.create.lock().unwrap() = CannedResponse::new(status, body);
        }

        pub fn push_sensor_response(&self, status: u16, body: impl Into<String>) {
            self.state
                .sensor
                .lock()
                .unwrap()
                .push_back(CannedResponse::new(status, body));
        }

        pub fn respond_to_update(&self, status: u16, body: impl Into<String>) {
            *self.state.update.lock().unwrap() = CannedResponse::new(status, body);
        }

        pub fn calls(&self) -> Vec<ServiceCall> {
            self.state.calls.lock().unwrap().clone()
        }
    }

    impl Drop for StubServer {
        fn drop(&mut self) {
            let _ = self.server_handle.stop(false);
            if let Some(thread) = self.server_thread.take() {
                let _ = thread.join();
            }
        }
    }

    async fn handle_create(
        state: web::Data<StubState>,
        body: web::Json<RedemptionRequest>,
    ) -> HttpResponse {
        state
            .calls
            .lock()
            .unwrap()
            .push(ServiceCall::Create(body.into_inner()));
        state.create.lock().unwrap().clone().into_response()
    }

    async fn handle_check(state: web::Data<StubState>, id: web::Path<i64>) -> HttpResponse {
        state
            .calls
            .lock()
            .unwrap()
            .push(ServiceCall::Check(RecordId(id.into_inner())));
        let next = state.sensor.lock().unwrap().pop_front();
        match next {
            Some(canned) => canned.into_response(),
            None => state.sensor_fallback.lock().unwrap().clone().into_response(),
        }
    }

    async fn handle_update(
        state: web::Data<StubState>,
        id: web::Path<i64>,
        body: web::Json<UpdateBody>,
    ) -> HttpResponse {
        state
            .calls
            .lock()
            .unwrap()
            .push(ServiceCall::Update(RecordId(id.into_inner()), body.status));
        state.update.lock().unwrap().clone().into_response()
    }
}
