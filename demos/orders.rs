//! Small order service showing the request facade.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example orders
//!
//! Try:
//!   curl -H 'request-id: abc' http://localhost:3000/orders/42?expand=items
//!   curl -X POST http://localhost:3000/orders -d '{"sku":"A-1","qty":2}'
//!   curl -X POST http://localhost:3000/orders -d 'not json'
//!   curl -X PUT  http://localhost:3000/uploads --data-binary @some-file

use portico::{BodyError, Config, Metric, Request, Response, Router, Server, StatusCode};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = Router::new()
        .get("/orders/{id}", get_order)
        .post("/orders", create_order)
        .put("/uploads", upload);

    let config = Config::new()
        .request_id_headers(["x-request-id", "request-id"])
        .max_body_size(16 * 1024);

    Server::bind("0.0.0.0:3000")
        .config(config)
        .serve(app)
        .await
        .expect("server error");
}

// GET /orders/{id}
async fn get_order(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    let expand = req.query().get("expand").unwrap_or("none");

    match req.accept().r#type(&["application/json", "text/plain"]) {
        Some("text/plain") => Response::text(format!("order {id} (expand={expand})")),
        Some(_) => Response::json(format!(r#"{{"id":"{id}","expand":"{expand}","trace":"{}"}}"#, req.id())),
        None => Response::status(StatusCode::NOT_ACCEPTABLE),
    }
}

// POST /orders: bad JSON is 400, oversized is 413.
async fn create_order(req: Request) -> Result<Response, BodyError> {
    let order = req.body().await?;
    req.metric(Metric::new("orders.created", 1.0));

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/orders/99")
        .json(order.to_string()))
}

// PUT /uploads: streams the raw body, so body() is off for this request.
async fn upload(req: Request) -> Response {
    let mut sink = tokio::io::sink();
    match req.pipe(&mut sink).await {
        Ok(bytes) => Response::text(format!("received {bytes} bytes")),
        Err(_) => Response::status(StatusCode::BAD_REQUEST),
    }
}
