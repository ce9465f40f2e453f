//! Bootstrap and reload sequencing
//!
//! Discovery fans out into five independent categories running side by
//! side. Each category issues its queries in parallel, joins them, writes
//! the result with [`Scope::Discovery`] and then marks its milestone; the
//! store flips to ready (or commits the reload) once all five are set.
//!
//! A failing step is retried once after `ami.bootstrap_retry_delay_ms`. A
//! step that fails twice leaves its milestone unset, so readiness is never
//! signalled for that round.

use chrono::Utc;
use cti_core::config::ExtensionConfig;
use cti_core::models::{ExtensionStatus, ForwardKind, ForwardTarget, MeetmeConference, Parking};
use cti_core::{AppError, AppResult};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::commands::{names, CommandArgs};
use crate::engine::EngineContext;
use crate::error::CommandError;
use crate::queues::apply_snapshot;
use crate::store::{LifecycleState, Milestone, Scope};

/// Technologies whose endpoints have a detail query
const DETAILED_TECHS: &[&str] = &["pjsip"];

/// Run one discovery round, as bootstrap or as reload
pub async fn run(ctx: EngineContext, reload: bool) {
    let started = Instant::now();

    let reloading = match ctx
        .store()
        .update(move |s| {
            if reload {
                s.begin_reload()
            } else {
                s.reset();
                false
            }
        })
        .await
    {
        Ok(reloading) => reloading,
        Err(e) => {
            error!("Cannot start discovery: {}", e);
            return;
        }
    };
    info!(reload = reloading, "Discovery started");

    let (extensions, queues, parkings, trunks, conferences) = tokio::join!(
        category(&ctx, Milestone::Extensions, discover_extensions(&ctx)),
        category(&ctx, Milestone::Queues, retry(&ctx, "queues", || discover_queues(&ctx))),
        category(&ctx, Milestone::Parkings, retry(&ctx, "parkings", || discover_parkings(&ctx))),
        category(&ctx, Milestone::Trunks, retry(&ctx, "trunks", || discover_trunks(&ctx))),
        category(
            &ctx,
            Milestone::Conferences,
            retry(&ctx, "conferences", || discover_conferences(&ctx))
        ),
    );

    let failed = [extensions, queues, parkings, trunks, conferences]
        .into_iter()
        .filter(|ok| !ok)
        .count();
    if failed == 0 {
        info!("Discovery finished in {:?}", started.elapsed());
    } else {
        error!("Discovery incomplete: {} categories failed, model not ready", failed);
    }
}

/// Await a category and record its milestone; returns false on failure
async fn category<F>(ctx: &EngineContext, milestone: Milestone, work: F) -> bool
where
    F: Future<Output = AppResult<()>>,
{
    if let Err(e) = work.await {
        error!("Discovery of {:?} failed: {}", milestone, e);
        return false;
    }

    match ctx.store().update(move |s| s.complete(milestone)).await {
        Ok(Some(LifecycleState::Ready)) => info!("All milestones reached, model is ready"),
        Ok(_) => {}
        Err(e) => {
            error!("Cannot record milestone {:?}: {}", milestone, e);
            return false;
        }
    }
    true
}

/// Run `op`, and once more after the retry delay if it failed
async fn retry<F, Fut, T>(ctx: &EngineContext, what: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(e) => {
            let delay = ctx.config().ami.bootstrap_retry_delay_ms;
            warn!("Discovery of {} failed ({}), retrying in {}ms", what, e, delay);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            op().await
        }
    }
}

// ==================== Extensions ====================

async fn discover_extensions(ctx: &EngineContext) -> AppResult<()> {
    let extensions = ctx.config().pbx.extensions.clone();
    let count = extensions.len();

    let results = join_all(extensions.iter().map(|ext| {
        let what = format!("extension {}", ext.id);
        async move { retry(ctx, &what, || discover_extension(ctx, ext)).await }
    }))
    .await;

    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        return Err(AppError::Internal(format!(
            "{} of {} extensions failed discovery",
            failed, count
        )));
    }

    let owners = retry(ctx, "channels", || ctx.reconcile_channels(Scope::Discovery)).await?;
    debug!("{} extensions discovered, {} owners with calls", count, owners.len());
    Ok(())
}

async fn forward(ctx: &EngineContext, exten: &str, kind: ForwardKind) -> Result<ForwardTarget, CommandError> {
    let args = CommandArgs::new()
        .with("exten", exten)
        .with("kind", kind.db_family());
    let value = ctx
        .execute(names::GET_CALL_FORWARD, &args)
        .await?
        .into_forward()?;
    Ok(ForwardTarget::from_db_value(value.as_deref()))
}

/// The parallel per-extension query batch
async fn discover_extension(ctx: &EngineContext, ext: &ExtensionConfig) -> AppResult<()> {
    let args = CommandArgs::new().with("exten", ext.id.as_str());
    let detailed = DETAILED_TECHS.contains(&ext.tech.to_lowercase().as_str());

    let device = async {
        if !detailed {
            return Ok::<_, CommandError>(None);
        }
        let output = ctx.execute(names::EXTEN_DETAILS, &args).await?;
        output.into_device().map(Some)
    };
    let status = async {
        ctx.execute(names::EXTEN_STATUS, &args)
            .await?
            .into_exten_status()
    };
    let dnd = async { ctx.execute(names::GET_DND, &args).await?.into_flag() };

    let (device, status, dnd, cf, cfb, cfu) = tokio::join!(
        device,
        status,
        dnd,
        forward(ctx, &ext.id, ForwardKind::Unconditional),
        forward(ctx, &ext.id, ForwardKind::Busy),
        forward(ctx, &ext.id, ForwardKind::Unavailable),
    );

    let device = device?;
    let status: ExtensionStatus = status?;
    let dnd = dnd?;
    let forwards = [
        (ForwardKind::Unconditional, cf?),
        (ForwardKind::Busy, cfb?),
        (ForwardKind::Unavailable, cfu?),
    ];

    let id = ext.id.clone();
    ctx.store()
        .update(move |s| {
            s.update_extension(Scope::Discovery, &id, move |e| {
                if let Some(device) = &device {
                    e.device = device.clone();
                }
                e.set_status(status);
                e.set_dnd(dnd);
                for (kind, target) in &forwards {
                    e.set_forward(*kind, target);
                }
                true
            })
        })
        .await??;
    Ok(())
}

// ==================== Queues ====================

async fn discover_queues(ctx: &EngineContext) -> AppResult<()> {
    let listed = ctx
        .execute(names::LIST_QUEUES, &CommandArgs::new())
        .await?
        .into_queues()?;

    let ids = ctx
        .store()
        .update(move |s| {
            for id in &listed {
                s.ensure_queue(Scope::Discovery, id);
            }
            s.queue_ids(Scope::Discovery)
        })
        .await?;

    let details = join_all(ids.iter().map(|id| async move {
        let args = CommandArgs::new().with("queue", id.as_str());
        let snapshot = ctx
            .execute(names::QUEUE_DETAILS, &args)
            .await?
            .into_queue_details()?;
        Ok::<_, CommandError>((id.clone(), snapshot))
    }))
    .await;

    for detail in details {
        let (id, snapshot) = detail?;
        ctx.store()
            .update(move |s| {
                s.update_queue(Scope::Discovery, &id, |queue, dynamic| {
                    apply_snapshot(queue, &snapshot, dynamic, Utc::now());
                    true
                })
            })
            .await??;
    }

    debug!("{} queues discovered", ids.len());
    Ok(())
}

// ==================== Parkings ====================

async fn discover_parkings(ctx: &EngineContext) -> AppResult<()> {
    let none = CommandArgs::new();
    let (spaces, parked) = tokio::join!(
        ctx.execute(names::LIST_PARKINGS, &none),
        ctx.execute(names::LIST_PARKED_CALLS, &none),
    );
    let spaces = spaces?.into_parkings()?;
    let parked = parked?.into_parked_calls()?;

    let mut parkings: Vec<Parking> = spaces
        .into_iter()
        .map(|s| Parking::new(&s.id, &s.name, s.timeout_secs))
        .collect();

    for caller in parked {
        match parkings.iter_mut().find(|p| p.id == caller.parking_id) {
            Some(parking) => parking.park(caller),
            None => warn!("Parked call in unknown space {}", caller.parking_id),
        }
    }

    let count = parkings.len();
    ctx.store()
        .update(move |s| s.set_parkings(Scope::Discovery, parkings))
        .await?;
    debug!("{} parking spaces discovered", count);
    Ok(())
}

// ==================== Trunks ====================

async fn discover_trunks(ctx: &EngineContext) -> AppResult<()> {
    let techs: BTreeSet<String> = ctx
        .config()
        .pbx
        .trunks
        .iter()
        .map(|t| t.tech.to_lowercase())
        .collect();

    for tech in techs {
        let command = match tech.as_str() {
            "pjsip" => names::PJSIP_REGISTRATIONS,
            "iax" | "iax2" => names::IAX_REGISTRATIONS,
            other => {
                debug!("No registration listing for {} trunks", other);
                continue;
            }
        };

        let registrations = ctx
            .execute(command, &CommandArgs::new())
            .await?
            .into_registrations()?;

        ctx.store()
            .update(move |s| {
                for registration in registrations {
                    let state = registration.state;
                    if let Err(e) = s.update_trunk(Scope::Discovery, &registration.trunk_id, |t| {
                        t.set_registration(state)
                    }) {
                        debug!("Registration for unconfigured trunk: {}", e);
                    }
                }
            })
            .await?;
    }
    Ok(())
}

// ==================== Conferences ====================

async fn discover_conferences(ctx: &EngineContext) -> AppResult<()> {
    let users = ctx
        .execute(names::LIST_MEETME_CONF, &CommandArgs::new())
        .await?
        .into_conferences()?;

    let pbx = &ctx.config().pbx;
    let mut conferences: BTreeMap<String, MeetmeConference> = BTreeMap::new();
    for info in &users {
        conferences
            .entry(info.conference.clone())
            .or_insert_with(|| MeetmeConference::new(&info.conference))
            .add_user(info.to_user(pbx));
    }

    let count = conferences.len();
    ctx.store()
        .update(move |s| s.set_conferences(Scope::Discovery, conferences.into_values().collect()))
        .await?;
    debug!("{} running conferences discovered", count);
    Ok(())
}
