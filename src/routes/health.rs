use rocket::{get, http::Status};
use rocket_okapi::openapi;

#[openapi(tag = "Health")]
#[get("/")]
pub async fn healthcheck() -> Status {
    Status::Ok
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![healthcheck]
}

#[cfg(test)]
mod tests {
    use crate::{Config, build_rocket};
    use rocket::http::Status;
    use rocket::local::asynchronous::Client;

    #[rocket::async_test]
    async fn health_check_works() {
        let mut config = Config::default();
        config.database.run_migrations = false;

        let client = Client::tracked(build_rocket(config)).await.expect("valid rocket instance");
        let response = client.get("/api/health").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
    }
}
