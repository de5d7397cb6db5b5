mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{body_text, location, png_bytes, session_cookie, TestApp, PASSWORD};
use image::GenericImageView;
use findtutor::{
    models::{CourseLevel, Mycourse, Profile, Role},
    test_utils::test_helpers,
};

#[tokio::test]
async fn test_anonymous_root_goes_to_landing_page() {
    let t = TestApp::new().await;

    let response = t.get("/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/home");

    let response = t.get("/home", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Find the right tutor"));

    assert_eq!(t.get("/about-us", None).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_path_renders_404() {
    let t = TestApp::new().await;
    let response = t.get("/no/such/page", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("does not exist"));
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let t = TestApp::new().await;
    let response = t.get("/home", None).await;
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key("content-security-policy"));
}

#[tokio::test]
async fn test_login_dispatches_each_role_home() {
    let t = TestApp::new().await;
    t.user("sita", Role::Student).await;
    t.user("hari", Role::Tutor).await;
    t.user("boss", Role::Admin).await;

    let cases = [
        ("sita@example.com", "/student/home"),
        ("hari@example.com", "/tutor/home"),
        ("boss@example.com", "/admin"),
    ];
    for (email, home) in cases {
        let (cookie, target) = t.login(email, PASSWORD).await;
        assert_eq!(target, home, "login of {}", email);

        // Signed-in visitors to / and /login are dispatched too
        let response = t.get("/", Some(&cookie)).await;
        assert_eq!(location(&response), home);
        let response = t.get("/login", Some(&cookie)).await;
        assert_eq!(location(&response), home);
    }
}

#[tokio::test]
async fn test_failed_login_flashes_and_returns_to_login() {
    let t = TestApp::new().await;
    t.user("sita", Role::Student).await;

    let (cookie, token) = t.csrf("/login", None).await;
    let response = t
        .post_form(
            "/login",
            Some(&cookie),
            &[
                ("email", "sita@example.com"),
                ("password", "not-the-password"),
                ("csrf_token", &token),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let page = body_text(t.get("/login", Some(&cookie)).await).await;
    assert!(page.contains("Invalid email or password"));
}

#[tokio::test]
async fn test_login_rejects_missing_csrf_token() {
    let t = TestApp::new().await;
    t.user("sita", Role::Student).await;

    let (cookie, _) = t.csrf("/login", None).await;
    let response = t
        .post_form(
            "/login",
            Some(&cookie),
            &[
                ("email", "sita@example.com"),
                ("password", PASSWORD),
                ("csrf_token", "forged"),
            ],
        )
        .await;
    assert_eq!(location(&response), "/login");
    assert!(t.get("/student/home", Some(&cookie)).await.status().is_redirection());
}

#[tokio::test]
async fn test_register_then_login() {
    let t = TestApp::new().await;

    let (cookie, token) = t.csrf("/register", None).await;
    let response = t
        .post_form(
            "/register",
            Some(&cookie),
            &[
                ("username", "gita"),
                ("email", "gita@example.com"),
                ("password", "secret-pass"),
                ("password_confirm", "secret-pass"),
                ("role", "tutor"),
                ("phone", "9841000000"),
                ("csrf_token", &token),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let page = body_text(t.get("/login", Some(&cookie)).await).await;
    assert!(page.contains("Your account was created. You can now Login!"));

    let (_, target) = t.login("gita@example.com", "secret-pass").await;
    assert_eq!(target, "/tutor/home");
}

#[tokio::test]
async fn test_register_refuses_admin_role() {
    let t = TestApp::new().await;

    let (cookie, token) = t.csrf("/register", None).await;
    let response = t
        .post_form(
            "/register",
            Some(&cookie),
            &[
                ("username", "mallory"),
                ("email", "mallory@example.com"),
                ("password", "secret-pass"),
                ("password_confirm", "secret-pass"),
                ("role", "admin"),
                ("phone", "9841000000"),
                ("csrf_token", &token),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Please register as a student or a tutor"));

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&t.pool)
        .await
        .unwrap();
    assert_eq!(users, 0);
}

#[tokio::test]
async fn test_logout_clears_identity() {
    let t = TestApp::new().await;
    t.user("sita", Role::Student).await;
    let cookie = t.login_as("sita").await;

    let response = t.get("/logout", Some(&cookie)).await;
    assert_eq!(location(&response), "/login");
    let cookie = session_cookie(&response).unwrap_or(cookie);

    let page = body_text(t.get("/login", Some(&cookie)).await).await;
    assert!(page.contains("You are now logged out. Log in to continue!"));

    let response = t.get("/student/home", Some(&cookie)).await;
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_profile_pages_require_login() {
    let t = TestApp::new().await;
    for path in ["/student/home", "/tutor/mylocation", "/courses"] {
        let response = t.get(path, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", path);
        assert_eq!(location(&response), "/login", "{}", path);
    }
}

#[tokio::test]
async fn test_profile_sections_render_for_owner() {
    let t = TestApp::new().await;
    t.user("sita", Role::Student).await;
    let cookie = t.login_as("sita").await;

    for section in ["home", "mylocation", "personal-info", "account-info", "my-courses"] {
        let response = t.get(&format!("/student/{}", section), Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK, "section {}", section);
        let body = body_text(response).await;
        // Default picture until one is uploaded
        assert!(body.contains("/static/profile_pics/student.png"), "section {}", section);
    }
}

#[tokio::test]
async fn test_cross_role_pages_redirect_to_own_section() {
    let t = TestApp::new().await;
    t.user("sita", Role::Student).await;
    t.user("hari", Role::Tutor).await;

    let student = t.login_as("sita").await;
    let response = t.get("/tutor/mylocation", Some(&student)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/student/mylocation");

    let tutor = t.login_as("hari").await;
    let response = t.get("/student/account-info", Some(&tutor)).await;
    assert_eq!(location(&response), "/tutor/account-info");
}

#[tokio::test]
async fn test_admin_has_no_profile_pages() {
    let t = TestApp::new().await;
    t.user("boss", Role::Admin).await;
    let cookie = t.login_as("boss").await;

    assert_eq!(
        t.get("/student/home", Some(&cookie)).await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        t.get("/tutor/my-courses", Some(&cookie)).await.status(),
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_location_update() {
    let t = TestApp::new().await;
    let id = t.user("hari", Role::Tutor).await;
    let cookie = t.login_as("hari").await;

    let (cookie, token) = t.csrf("/tutor/mylocation", Some(&cookie)).await;
    let response = t
        .post_form(
            "/tutor/mylocation",
            Some(&cookie),
            &[
                ("travel_distance", "Within 5 km"),
                ("latitude", "27.7172"),
                ("longitude", "85.3240"),
                ("place", "Thamel"),
                ("csrf_token", &token),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/tutor/mylocation");

    let stored = findtutor::models::Location::get_by_user(&t.pool, id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.travel_distance.as_deref(), Some("Within 5 km"));
    assert_eq!(stored.latitude, Some(27.7172));

    // Out-of-range values re-render with the message
    let (cookie, token) = t.csrf("/tutor/mylocation", Some(&cookie)).await;
    let response = t
        .post_form(
            "/tutor/mylocation",
            Some(&cookie),
            &[
                ("travel_distance", "Within 5 km"),
                ("latitude", "120"),
                ("longitude", "85.3240"),
                ("place", ""),
                ("csrf_token", &token),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Latitude must be a number"));
}

fn multipart_body(boundary: &str, fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"profile_pic\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
                boundary, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

#[tokio::test]
async fn test_personal_info_with_picture_upload() {
    let t = TestApp::new().await;
    let id = t.user("sita", Role::Student).await;
    let cookie = t.login_as("sita").await;

    let (cookie, token) = t.csrf("/student/personal-info", Some(&cookie)).await;
    let boundary = "fyt-test-boundary";
    let png = png_bytes(400, 300);
    let body = multipart_body(
        boundary,
        &[
            ("csrf_token", &token),
            ("full_name", "Sita Sharma"),
            ("state", "Bagmati"),
            ("ward_no", "4"),
            ("guardian_name", "Ram Sharma"),
        ],
        Some(("me.png", &png)),
    );

    let request = Request::builder()
        .method("POST")
        .uri("/student/personal-info")
        .header(header::COOKIE, &cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();
    let response = t.send(request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/student/personal-info");

    let Some(Profile::Student(student)) = Profile::load(&t.pool, id, Role::Student).await.unwrap()
    else {
        panic!("student profile missing");
    };
    assert_eq!(student.full_name.as_deref(), Some("Sita Sharma"));
    assert_eq!(student.guardian_name.as_deref(), Some("Ram Sharma"));
    assert_eq!(student.phone, None);

    let picture = student.profile_pic.expect("picture stored");
    assert_eq!(picture.len(), "0123456789abcdef.png".len());
    let stored = image::open(t.static_dir.path().join("profile_pics").join(&picture)).unwrap();
    assert!(stored.width() <= 125 && stored.height() <= 125);

    let page = body_text(t.get("/student/home", Some(&cookie)).await).await;
    assert!(page.contains(&format!("/static/profile_pics/{}", picture)));
}

#[tokio::test]
async fn test_my_courses_add_and_remove() {
    let t = TestApp::new().await;
    let id = t.user("hari", Role::Tutor).await;
    let other = t.user("gita", Role::Tutor).await;
    let course = test_helpers::create_test_course(&t.pool, "Physics", CourseLevel::Bachelor)
        .await
        .unwrap();
    let foreign = test_helpers::create_test_enrollment(&t.pool, other, course)
        .await
        .unwrap();
    let cookie = t.login_as("hari").await;

    let (cookie, token) = t.csrf("/tutor/my-courses", Some(&cookie)).await;
    let course_id = course.to_string();
    let response = t
        .post_form(
            "/tutor/my-courses",
            Some(&cookie),
            &[
                ("course_id", &course_id),
                ("time", "19:00"),
                ("cost", "Rs. 1000 - Rs. 1500"),
                ("csrf_token", &token),
            ],
        )
        .await;
    assert_eq!(location(&response), "/tutor/my-courses");

    let entries = Mycourse::list_for_user(&t.pool, id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].course_title, "Physics");
    assert_eq!(entries[0].time, "19:00");

    let page = body_text(t.get("/tutor/my-courses", Some(&cookie)).await).await;
    assert!(page.contains("Bachelor Level"));

    // Someone else's enrollment cannot be removed
    let (cookie, token) = t.csrf("/tutor/my-courses", Some(&cookie)).await;
    let response = t
        .post_form(
            &format!("/tutor/my-courses/{}/delete", foreign),
            Some(&cookie),
            &[("csrf_token", &token)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let (cookie, token) = t.csrf("/tutor/my-courses", Some(&cookie)).await;
    let response = t
        .post_form(
            &format!("/tutor/my-courses/{}/delete", entries[0].id),
            Some(&cookie),
            &[("csrf_token", &token)],
        )
        .await;
    assert_eq!(location(&response), "/tutor/my-courses");
    assert_eq!(Mycourse::count_for_user(&t.pool, id).await.unwrap(), 0);

    let (cookie, token) = t.csrf("/tutor/my-courses", Some(&cookie)).await;
    let response = t
        .post_form(
            "/tutor/my-courses/first/delete",
            Some(&cookie),
            &[("csrf_token", &token)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(Mycourse::count_for_user(&t.pool, other).await.unwrap(), 1);
}

#[tokio::test]
async fn test_change_password_requires_old_password() {
    let t = TestApp::new().await;
    t.user("sita", Role::Student).await;
    let cookie = t.login_as("sita").await;

    let (cookie, token) = t.csrf("/student/account-info", Some(&cookie)).await;
    let response = t
        .post_form(
            "/student/account-info",
            Some(&cookie),
            &[
                ("old_password", "wrong-password"),
                ("new_password", "brand-new-pass"),
                ("new_password_confirm", "brand-new-pass"),
                ("csrf_token", &token),
            ],
        )
        .await;
    assert_eq!(location(&response), "/student/account-info");
    let page = body_text(t.get("/student/account-info", Some(&cookie)).await).await;
    assert!(page.contains("Wrong password!"));

    let (cookie, token) = t.csrf("/student/account-info", Some(&cookie)).await;
    let response = t
        .post_form(
            "/student/account-info",
            Some(&cookie),
            &[
                ("old_password", PASSWORD),
                ("new_password", "brand-new-pass"),
                ("new_password_confirm", "brand-new-pass"),
                ("csrf_token", &token),
            ],
        )
        .await;
    assert_eq!(location(&response), "/student/home");
    let page = body_text(t.get("/student/home", Some(&cookie)).await).await;
    assert!(page.contains("Successfully changed password!"));

    let (_, target) = t.login("sita@example.com", "brand-new-pass").await;
    assert_eq!(target, "/student/home");
}

#[tokio::test]
async fn test_course_pages() {
    let t = TestApp::new().await;
    t.user("sita", Role::Student).await;
    let id = test_helpers::create_test_course(&t.pool, "Chemistry", CourseLevel::Secondary)
        .await
        .unwrap();

    // Detail is public
    let response = t.get(&format!("/courses/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Chemistry"));
    assert!(body.contains("Secondary Education(Grade 9-12)"));

    assert_eq!(
        t.get("/courses/9999", None).await.status(),
        StatusCode::NOT_FOUND
    );
    // Ids that are not numbers are missing pages, not bad requests
    for path in ["/courses/abc", "/courses/99999999999999999999"] {
        let response = t.get(path, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", path);
        assert!(body_text(response)
            .await
            .contains("The page you are looking for does not exist."));
    }

    let cookie = t.login_as("sita").await;
    let response = t.get("/courses", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Chemistry"));
    assert!(body.contains("/static/profile_pics/student.png"));
}

#[tokio::test]
async fn test_password_reset_request_does_not_reveal_accounts() {
    let t = TestApp::new().await;
    t.user("sita", Role::Student).await;

    let mut targets = Vec::new();
    for email in ["sita@example.com", "nobody@example.com"] {
        let (cookie, token) = t.csrf("/password-reset", None).await;
        let response = t
            .post_form(
                "/password-reset",
                Some(&cookie),
                &[("email", email), ("csrf_token", &token)],
            )
            .await;
        targets.push(location(&response).to_string());
        let page = body_text(t.get("/login", Some(&cookie)).await).await;
        assert!(page.contains("If an account exists for that email"));
    }
    assert_eq!(targets, vec!["/login", "/login"]);

    let tokens: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM password_reset_tokens")
        .fetch_one(&t.pool)
        .await
        .unwrap();
    assert_eq!(tokens, 1);
}

#[tokio::test]
async fn test_unknown_reset_token_redirects_to_request_page() {
    let t = TestApp::new().await;
    let response = t.get("/reset/not-a-token", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/password-reset");
}

#[tokio::test]
async fn test_remember_me_extends_the_session_cookie() {
    let t = TestApp::new().await;
    t.user("sita", Role::Student).await;

    let mut max_ages = Vec::new();
    for remember in [false, true] {
        let (cookie, token) = t.csrf("/login", None).await;
        let mut fields = vec![
            ("email", "sita@example.com"),
            ("password", PASSWORD),
            ("csrf_token", token.as_str()),
        ];
        if remember {
            fields.push(("remember_me", "y"));
        }
        let response = t.post_form("/login", Some(&cookie), &fields).await;
        assert_eq!(location(&response), "/student/home");

        let set_cookie = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("fyt_session="))
            .expect("login reissues the session cookie")
            .to_string();
        max_ages.push(set_cookie);
    }

    assert!(max_ages[0].contains("Max-Age=604800"), "{}", max_ages[0]);
    assert!(max_ages[1].contains("Max-Age=2592000"), "{}", max_ages[1]);
}
