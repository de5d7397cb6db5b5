//! Request-level helpers shared by the HTTP flow tests.
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use findtutor::{models::Role, test_utils::test_helpers};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    pub static_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = test_helpers::create_test_db().await.unwrap();
        let static_dir = TempDir::new().unwrap();
        let app = test_helpers::create_test_app(pool.clone(), static_dir.path())
            .await
            .unwrap();
        Self {
            app,
            pool,
            static_dir,
        }
    }

    pub async fn user(&self, username: &str, role: Role) -> i64 {
        test_helpers::insert_test_user(
            &self.pool,
            username,
            &format!("{}@example.com", username),
            PASSWORD,
            role,
        )
        .await
        .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, cookie: Option<&str>, fields: &[(&str, &str)]) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = serde_urlencoded::to_string(fields).unwrap();
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    /// Load `uri` and return the (possibly new) session cookie with the form token.
    pub async fn csrf(&self, uri: &str, cookie: Option<&str>) -> (String, String) {
        let response = self.get(uri, cookie).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {} for a form token", uri);
        let cookie = session_cookie(&response)
            .or_else(|| cookie.map(str::to_string))
            .expect("a session cookie");
        let body = body_text(response).await;
        (cookie, extract_csrf(&body))
    }

    /// Log in through the form; returns the session cookie and the redirect target.
    pub async fn login(&self, email: &str, password: &str) -> (String, String) {
        let (cookie, token) = self.csrf("/login", None).await;
        let response = self
            .post_form(
                "/login",
                Some(&cookie),
                &[("email", email), ("password", password), ("csrf_token", &token)],
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let target = location(&response).to_string();
        let cookie = session_cookie(&response).unwrap_or(cookie);
        (cookie, target)
    }

    pub async fn login_as(&self, username: &str) -> String {
        self.login(&format!("{}@example.com", username), PASSWORD)
            .await
            .0
    }
}

pub fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("fyt_session="))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn extract_csrf(body: &str) -> String {
    let marker = "name=\"csrf_token\" value=\"";
    let start = body.find(marker).expect("form carries a csrf token") + marker.len();
    let end = body[start..].find('"').unwrap() + start;
    body[start..end].to_string()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([30, 90, 200]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}
