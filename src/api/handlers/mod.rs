// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

pub mod auth;
pub mod conversations;
pub mod health;
pub mod links;
pub mod metrics;
pub mod notifications;
pub mod posts;
pub mod subscribe;
pub mod uploads;
