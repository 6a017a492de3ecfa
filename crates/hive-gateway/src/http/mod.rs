//! HTTP surface (spec §2.1): `GET /healthz`, `POST /v1/messages`,
//! `POST /v1/workflows/:id/run`.

pub mod health;
pub mod messages;
pub mod workflows;
