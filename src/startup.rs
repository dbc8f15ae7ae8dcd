use actix_web::{middleware::Logger, web, App, HttpServer};
use actix_web::dev::Server;
use std::net::TcpListener;

use crate::middleware::JwtMiddleware;
use crate::routes::{health_check, login, logout, refresh};
use crate::session::SessionManager;

pub fn run(listener: TcpListener, manager: SessionManager) -> Result<Server, std::io::Error> {
    let jwt_config = manager.jwt_settings().clone();
    let manager = web::Data::new(manager);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(manager.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            // Logout needs an established identity
            .service(
                web::scope("/auth")
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route("/logout", web::post().to(logout)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
