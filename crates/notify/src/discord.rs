//! Discord webhook notifications.
//!
//! Delivery is best-effort by contract: a webhook outage is logged and
//! forgotten, it never fails the check workflow.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info};

use creneau_core::config::DiscordConfig;
use creneau_core::Activity;

use crate::weather::WeatherReport;

/// Outbound notification seam, faked in scheduler tests.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// The day's planning just opened; includes the full activity list.
    async fn schedule_open(
        &self,
        target_date: NaiveDate,
        activities: &[Activity],
        weather: &WeatherReport,
    );

    /// One desired reservation was booked and confirmed on the page.
    async fn booking_confirmed(&self, display_name: &str, date: NaiveDate, activity: &str);

    /// The checker keeps failing and switched to the slow retry interval.
    async fn degraded(&self, message: &str, failure_count: u32, next_retry_secs: u64);

    /// The checker completed a cycle again after a degraded stretch.
    async fn recovered(&self);
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
    username: &'a str,
    avatar_url: &'a str,
}

pub struct DiscordNotifier {
    config: DiscordConfig,
    client: Client,
}

impl DiscordNotifier {
    pub fn new(config: DiscordConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    async fn send(&self, content: &str) {
        if !self.config.enabled || self.config.webhook_url.is_empty() {
            debug!("Discord disabled, skipping notification");
            return;
        }

        let payload = WebhookPayload {
            content,
            username: &self.config.username,
            avatar_url: &self.config.avatar_url,
        };

        match self
            .client
            .post(&self.config.webhook_url)
            .json(&payload)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                info!("Discord notification sent");
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                error!("Discord webhook returned {}: {}", status, body);
            }
            Err(e) => {
                error!("Discord webhook request failed: {}", e);
            }
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn schedule_open(
        &self,
        target_date: NaiveDate,
        activities: &[Activity],
        weather: &WeatherReport,
    ) {
        let message = format_planning_message(target_date, activities, weather);
        self.send(&message).await;
    }

    async fn booking_confirmed(&self, display_name: &str, date: NaiveDate, activity: &str) {
        let body = format_booking_message(display_name, date, activity);
        self.send(&body).await;
    }

    async fn degraded(&self, message: &str, failure_count: u32, next_retry_secs: u64) {
        let body = format_degraded_message(message, failure_count, next_retry_secs);
        self.send(&body).await;
    }

    async fn recovered(&self) {
        self.send(&format_recovery_message()).await;
    }
}

fn fmt_opt(value: Option<i32>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "?".to_string(),
    }
}

/// Full planning announcement: weather block, per-activity lines, stats.
pub fn format_planning_message(
    target_date: NaiveDate,
    activities: &[Activity],
    weather: &WeatherReport,
) -> String {
    let mut lines = vec![
        "🏋️ **PLANNING SPORT DISPONIBLE !** 🎉".to_string(),
        format!(
            "\n📅 Planning ouvert pour le {}",
            target_date.format("%d/%m/%Y")
        ),
        "\n🌤️ **Météo du jour:**".to_string(),
        format!("• Température: {}°C", fmt_opt(weather.temperature)),
        format!("• Conditions: {}", weather.description),
        format!("• Humidité: {}%", fmt_opt(weather.humidity)),
        "\n📋 **Activités disponibles:**".to_string(),
    ];

    let mut sorted: Vec<&Activity> = activities.iter().collect();
    sorted.sort_by(|a, b| a.start_time.cmp(&b.start_time));

    for activity in &sorted {
        let mut status = Vec::new();
        if activity.is_booked {
            status.push("🎟️ [Réservé]");
        }
        if activity.is_full {
            status.push("⛔ [Complet]");
        }
        lines.push(format!(
            "• {} - {} ({}) @ {} {}",
            activity.start_time,
            activity.name,
            activity.capacity,
            activity.room,
            status.join(" ")
        ));
    }

    let total = activities.len();
    let full = activities.iter().filter(|a| a.is_full).count();
    let booked = activities.iter().filter(|a| a.is_booked).count();
    lines.extend([
        "\n📊 **Résumé:**".to_string(),
        format!("• {} cours au total", total),
        format!("• {} cours disponibles", total - full),
        format!("• {} cours complets", full),
        format!("• {} cours déjà réservés", booked),
        "\n-------------------".to_string(),
        "Réservez vite vos places ! 🎟️".to_string(),
    ]);

    lines.join("\n")
}

pub fn format_booking_message(display_name: &str, date: NaiveDate, activity: &str) -> String {
    [
        "🎟️ **RÉSERVATION CONFIRMÉE !** ✅".to_string(),
        format!("\n• Cours: {}", activity),
        format!("• Date: {}", date.format("%d/%m/%Y")),
        format!("• Pour: {}", display_name),
        "\n-------------------".to_string(),
        "Bonne séance ! 💪".to_string(),
    ]
    .join("\n")
}

pub fn format_degraded_message(message: &str, failure_count: u32, next_retry_secs: u64) -> String {
    [
        "⚠️ **ATTENTION - PROBLÈME TECHNIQUE** ⚠️".to_string(),
        "\n🔧 **Le système de vérification rencontre des difficultés:**".to_string(),
        format!("• Erreur #{}: {}", failure_count, message),
        format!("• Prochaine tentative dans {} secondes", next_retry_secs),
        "\n⚡ Le système continue de fonctionner mais il est conseillé de:".to_string(),
        "• Vérifier manuellement vos réservations sur le site".to_string(),
        "• Ne pas vous fier uniquement aux notifications".to_string(),
        "\n-------------------".to_string(),
        "Le système vous tiendra informé dès qu'il sera rétabli 🛠️".to_string(),
    ]
    .join("\n")
}

pub fn format_recovery_message() -> String {
    [
        "✅ **SYSTÈME RÉTABLI** ✅",
        "\n🛠️ **Le système de vérification fonctionne à nouveau:**",
        "• Les erreurs ont été résolues",
        "• Les vérifications reprennent normalement",
        "\n-------------------",
        "Le système continue son travail normalement 🚀",
    ]
    .join("\n")
}
