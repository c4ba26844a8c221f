//! 上行消息分发。

use crate::{ConnectionContext, Hub};
use api_contract::{ClientMessage, CommandDto, ErrorCode, ServerMessage, decode_client_message};
use domain::{ConnectionId, DeviceStatus, PlaybackCommand, Role};
use signage_control::{CommandRequest, ControlError};
use signage_gateway::GatewayError;
use signage_registry::ReportOutcome;
use signage_telemetry::record_malformed_message;
use tracing::{debug, error, warn};

impl Hub {
    /// 处理一帧上行文本。解析失败只回复发送方，不影响连接。
    pub async fn handle_text(&self, ctx: &ConnectionContext, text: &str) {
        match decode_client_message(text) {
            Ok(message) => self.handle(ctx, message).await,
            Err(err) => self.reject_malformed(&ctx.connection_id, &err.to_string()),
        }
    }

    /// 非文本帧或无法解析的输入。
    pub fn reject_malformed(&self, connection_id: &ConnectionId, reason: &str) {
        record_malformed_message();
        warn!(
            target: "signage.hub",
            connection_id = %connection_id,
            reason = %reason,
            "malformed_message"
        );
        self.reply_error(connection_id, ErrorCode::MalformedMessage, reason);
    }

    pub async fn handle(&self, ctx: &ConnectionContext, message: ClientMessage) {
        let connection_id = &ctx.connection_id;
        debug!(
            target: "signage.hub",
            connection_id = %connection_id,
            message = message.kind(),
            "client_message"
        );
        match message {
            ClientMessage::Register {
                device_id,
                stored_asset_ids,
            } => self.on_register(connection_id, device_id, stored_asset_ids),
            ClientMessage::StatusReport {
                status,
                current_asset_id,
            } => {
                let outcome = self.registry.report_status(
                    connection_id,
                    DeviceStatus::from(status),
                    current_asset_id,
                );
                self.after_report(connection_id, outcome, "status_report");
            }
            ClientMessage::StoredAssetsReport { asset_ids } => {
                let outcome = self
                    .registry
                    .report_stored_assets(connection_id, asset_ids);
                self.after_report(connection_id, outcome, "stored_assets_report");
            }
            ClientMessage::ObserverSubscribe => {
                if let Err(err) = self.broadcaster.subscribe(connection_id) {
                    self.reply_gateway_error(connection_id, err);
                }
            }
            ClientMessage::PresenceRequest => {
                if let Err(err) = self.broadcaster.send_snapshot_to(connection_id) {
                    debug!(
                        target: "signage.hub",
                        connection_id = %connection_id,
                        error = %err,
                        "presence_reply_skipped"
                    );
                }
            }
            ClientMessage::Command { device_id, command } => {
                self.on_command(ctx, device_id, command).await;
            }
            ClientMessage::SignalRelay {
                to_connection_id,
                payload,
            } => {
                self.relay
                    .relay(connection_id, &ConnectionId::from(to_connection_id), payload);
            }
        }
    }

    fn on_register(
        &self,
        connection_id: &ConnectionId,
        device_id: String,
        stored_asset_ids: Vec<String>,
    ) {
        if let Err(err) = self
            .gateway
            .assign_role(connection_id, Role::Device(device_id.clone()))
        {
            self.reply_gateway_error(connection_id, err);
            return;
        }
        if let Err(err) = self
            .registry
            .register(&device_id, connection_id, stored_asset_ids)
        {
            error!(
                target: "signage.hub",
                connection_id = %connection_id,
                device_id = %device_id,
                error = %err,
                "register_failed"
            );
            return;
        }
        let _ = self.gateway.send(
            connection_id,
            ServerMessage::Registered {
                device_id,
                connection_id: connection_id.to_string(),
            },
        );
        self.broadcaster.broadcast("device_registered");
    }

    fn after_report(
        &self,
        connection_id: &ConnectionId,
        outcome: Result<ReportOutcome, signage_registry::RegistryError>,
        report: &'static str,
    ) {
        match outcome {
            Ok(outcome) if outcome.is_applied() => {
                self.broadcaster.broadcast(report);
            }
            Ok(_) => {}
            Err(err) => error!(
                target: "signage.hub",
                connection_id = %connection_id,
                report = report,
                error = %err,
                "report_failed"
            ),
        }
    }

    async fn on_command(&self, ctx: &ConnectionContext, device_id: String, command: CommandDto) {
        let issuer = &ctx.connection_id;
        match self.gateway.role(issuer) {
            Ok(Role::Device(_)) => {
                warn!(
                    target: "signage.hub",
                    connection_id = %issuer,
                    device_id = %device_id,
                    "command_from_device_rejected"
                );
                self.reply_error(
                    issuer,
                    ErrorCode::RoleConflict,
                    "device connections cannot issue commands",
                );
                return;
            }
            Ok(_) => {}
            Err(_) => return,
        }

        let (command, locator) = match self.resolve_command(ctx, command).await {
            Ok(resolved) => resolved,
            Err(reason) => {
                self.reject_malformed(issuer, &reason);
                return;
            }
        };
        let request = CommandRequest {
            issuer: issuer.clone(),
            device_id,
            command,
            locator,
        };
        match self.router.route_command(request).await {
            Ok(routed) => {
                let _ = self.gateway.send(
                    issuer,
                    ServerMessage::CommandAccepted {
                        device_id: routed.device_id,
                        kind: routed.kind.as_str().to_string(),
                    },
                );
            }
            Err(ControlError::TargetUnreachable(device_id)) => {
                self.reply_error(
                    issuer,
                    ErrorCode::TargetUnreachable,
                    &format!("device {} is not connected", device_id),
                );
            }
            Err(err) => error!(
                target: "signage.hub",
                connection_id = %issuer,
                error = %err,
                "command_route_failed"
            ),
        }
    }

    /// 上行指令转为领域指令；`fetchAsset` 缺省地址时按素材库推导。
    async fn resolve_command(
        &self,
        ctx: &ConnectionContext,
        command: CommandDto,
    ) -> Result<(PlaybackCommand, Option<String>), String> {
        match command {
            CommandDto::FetchAsset {
                asset_id,
                source_locator: Some(source_locator),
            } => Ok((
                PlaybackCommand::FetchAsset {
                    asset_id,
                    source_locator,
                },
                None,
            )),
            CommandDto::FetchAsset {
                asset_id,
                source_locator: None,
            } => {
                let locator = self
                    .locator_for(&asset_id, &ctx.request_base_url)
                    .await
                    .map_err(|err| err.to_string())?
                    .ok_or_else(|| {
                        format!("sourceLocator is required for unknown asset {}", asset_id)
                    })?;
                Ok((
                    PlaybackCommand::FetchAsset {
                        asset_id,
                        source_locator: locator,
                    },
                    None,
                ))
            }
            CommandDto::Play { asset_id } => {
                let locator = self
                    .locator_for(&asset_id, &ctx.request_base_url)
                    .await
                    .unwrap_or(None);
                Ok((PlaybackCommand::Play { asset_id }, locator))
            }
            CommandDto::Stop => Ok((PlaybackCommand::Stop, None)),
            CommandDto::DeleteAsset { asset_id } => {
                Ok((PlaybackCommand::DeleteAsset { asset_id }, None))
            }
        }
    }

    fn reply_gateway_error(&self, connection_id: &ConnectionId, err: GatewayError) {
        match err {
            GatewayError::RoleConflict { .. } => {
                self.reply_error(connection_id, ErrorCode::RoleConflict, &err.to_string());
            }
            other => debug!(
                target: "signage.hub",
                connection_id = %connection_id,
                error = %other,
                "gateway_reply_skipped"
            ),
        }
    }

    fn reply_error(&self, connection_id: &ConnectionId, code: ErrorCode, message: &str) {
        let _ = self
            .gateway
            .send(connection_id, ServerMessage::error(code, message));
    }
}
