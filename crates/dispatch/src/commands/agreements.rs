//! Agreements command: the register, detail pages, edit/search forms and
//! contractor assignment.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tracing::warn;

use col_agreements::{AgreementUpdate, Endorsement};
use col_core::{AgreementId, CommandDescriptor, ContractorId, DomainError};
use col_storage::StorageGateway;

use crate::context::{RequestContext, OP_DELETE, OP_INSERT, OP_SEARCH, OP_SELECT, OP_UPDATE};
use crate::error::{CommandError, RegistryError};
use crate::handler::{require_view, CommandHandler};
use crate::outcome::CommandOutcome;

/// Secondary object token for contractor-flavoured branches.
pub const OBJECT_CONTRACTOR: &str = "contractor";

/// Views this command can land on, fixed at construction.
#[derive(Debug, Clone)]
struct Page {
    view: &'static str,
    title: &'static str,
}

pub struct AgreementsCommand {
    descriptor: CommandDescriptor,
    gateway: Arc<dyn StorageGateway>,
    pages: HashMap<&'static str, Page>,
}

impl AgreementsCommand {
    pub fn new(
        descriptor: CommandDescriptor,
        gateway: Arc<dyn StorageGateway>,
    ) -> Result<Self, RegistryError> {
        require_view(&descriptor)?;
        let mut pages = HashMap::new();
        pages.insert(
            "detail",
            Page { view: "agreement", title: "Agreement" },
        );
        pages.insert(
            "edit",
            Page { view: "agreementForm", title: "Edit agreement" },
        );
        pages.insert(
            "search",
            Page { view: "searchForm", title: "Search agreements" },
        );
        pages.insert(
            "results",
            Page { view: "searchResults", title: "Search results" },
        );
        pages.insert(
            "assign",
            Page { view: "contractorAssignForm", title: "Assign contractors" },
        );
        pages.insert(
            "register",
            Page { view: "contractorsRegister", title: "Contractors" },
        );
        pages.insert(
            "card",
            Page { view: "contractorCard", title: "Contractor" },
        );
        Ok(Self {
            descriptor,
            gateway,
            pages,
        })
    }

    fn page(&self, key: &str) -> &Page {
        // every key is inserted in the constructor
        &self.pages[key]
    }

    fn page_outcome(&self, key: &str) -> CommandOutcome {
        let page = self.page(key);
        CommandOutcome::view(page.view).titled(page.title)
    }

    async fn landing(&self, ctx: &RequestContext) -> Result<CommandOutcome, CommandError> {
        let agreements = self.gateway.agreements_for(ctx.principal()).await?;
        Ok(CommandOutcome::view(self.descriptor.default_view.clone())
            .titled(self.descriptor.label.clone())
            .with_agreements(agreements))
    }

    async fn read(&self, ctx: &RequestContext) -> Result<CommandOutcome, CommandError> {
        match (ctx.op(), ctx.object(), ctx.id()) {
            (OP_SELECT, OBJECT_CONTRACTOR, Some(id)) => {
                let contractor = self.gateway.contractor(ContractorId::new(id.as_i64())).await?;
                Ok(self.page_outcome("card").with_contractor(contractor))
            }
            (OP_SELECT, OBJECT_CONTRACTOR, None) => {
                let contractors = self.gateway.contractors(None).await?;
                Ok(self.page_outcome("register").with_contractors(contractors))
            }
            (OP_SELECT, _, Some(id)) => {
                let agreement = self.gateway.agreement(ctx.principal(), id).await?;
                let contractors = self.gateway.contractors_of(id).await?;
                Ok(self
                    .page_outcome("detail")
                    .with_agreement(agreement)
                    .with_contractors(contractors))
            }
            (OP_SELECT, _, None) => self.landing(ctx).await,
            (OP_INSERT, OBJECT_CONTRACTOR, Some(id)) => self.assignment_form(ctx, id).await,
            (OP_UPDATE, _, Some(id)) => {
                let agreement = self.gateway.agreement(ctx.principal(), id).await?;
                let kinds = self.gateway.agreement_kinds().await?;
                let scopes = self.gateway.agreement_scopes().await?;
                Ok(self
                    .page_outcome("edit")
                    .with_agreement(agreement)
                    .with_kinds(kinds)
                    .with_scopes(scopes))
            }
            (OP_SEARCH, _, _) => {
                let kinds = self.gateway.agreement_kinds().await?;
                let scopes = self.gateway.agreement_scopes().await?;
                Ok(self.page_outcome("search").with_kinds(kinds).with_scopes(scopes))
            }
            (op, object, _) => {
                warn!(op, object, "unrecognized read operation, showing landing list");
                self.landing(ctx).await
            }
        }
    }

    async fn write(&self, ctx: &RequestContext) -> Result<CommandOutcome, CommandError> {
        match (ctx.op(), ctx.object(), ctx.id()) {
            (OP_UPDATE, OBJECT_CONTRACTOR, Some(id)) => {
                self.store_assignments(ctx, id).await?;
                let agreement = self.gateway.agreement(ctx.principal(), id).await?;
                let assigned = self.gateway.contractors_of(id).await?;
                Ok(self
                    .page_outcome("assign")
                    .with_agreement(agreement)
                    .with_contractors(assigned))
            }
            (OP_INSERT, OBJECT_CONTRACTOR, Some(id)) => {
                self.store_assignments(ctx, id).await?;
                Ok(CommandOutcome::redirect_to(format!(
                    "ent={}&op={}&id={}",
                    self.descriptor.token, OP_SELECT, id
                )))
            }
            (OP_UPDATE, _, Some(id)) => {
                let update = update_from(ctx, id)?;
                let agreement = self
                    .gateway
                    .update_agreement(ctx.principal(), &update, Utc::now())
                    .await?;
                let contractors = self.gateway.contractors_of(id).await?;
                Ok(self
                    .page_outcome("detail")
                    .with_agreement(agreement)
                    .with_contractors(contractors))
            }
            (OP_SEARCH, _, _) => {
                let criteria = col_agreements::SearchCriteria {
                    title: ctx.param("q").map(str::to_string),
                    kind: ctx.param("kind").map(str::to_string),
                    scope: ctx.param("scope").map(str::to_string),
                };
                let agreements = self
                    .gateway
                    .search_agreements(ctx.principal(), &criteria)
                    .await?;
                Ok(self.page_outcome("results").with_agreements(agreements))
            }
            (OP_DELETE, _, _) => {
                warn!("delete operations are not supported, showing landing list");
                self.landing(ctx).await
            }
            (op, object, _) => {
                warn!(op, object, "unrecognized write operation, showing landing list");
                self.landing(ctx).await
            }
        }
    }

    async fn assignment_form(
        &self,
        ctx: &RequestContext,
        id: AgreementId,
    ) -> Result<CommandOutcome, CommandError> {
        let agreement = self.gateway.agreement(ctx.principal(), id).await?;
        let assignable = self.gateway.contractors(Some(id)).await?;
        Ok(self
            .page_outcome("assign")
            .with_agreement(agreement)
            .with_contractors(assignable))
    }

    async fn store_assignments(
        &self,
        ctx: &RequestContext,
        id: AgreementId,
    ) -> Result<(), CommandError> {
        let contractors: Vec<ContractorId> = ctx
            .id_list("contractors")
            .into_iter()
            .map(ContractorId::new)
            .collect();
        if contractors.is_empty() {
            return Err(CommandError::invalid("no contractors selected"));
        }
        self.gateway
            .assign_contractors(ctx.principal(), id, &contractors, Utc::now())
            .await?;
        Ok(())
    }
}

fn endorsement_from(ctx: &RequestContext, date_param: &str, note_param: &str) -> Option<Endorsement> {
    let date = ctx
        .param(date_param)
        .and_then(|v| NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").ok())?;
    Some(Endorsement {
        date,
        note: ctx.param(note_param).map(str::to_string),
    })
}

fn update_from(ctx: &RequestContext, id: AgreementId) -> Result<AgreementUpdate, CommandError> {
    let title = ctx
        .param("title")
        .map(str::to_string)
        .ok_or_else(|| CommandError::Domain(DomainError::missing("agreement title")))?;
    Ok(AgreementUpdate {
        id,
        title,
        registry_number: ctx.param("registry_number").map(str::to_string),
        description: ctx.param("description").map(str::to_string),
        notes: ctx.param("notes").map(str::to_string),
        approval: endorsement_from(ctx, "approval_date", "approval_note"),
        second_approval: endorsement_from(ctx, "second_approval_date", "second_approval_note"),
        signing: endorsement_from(ctx, "signing_date", "signing_note"),
        expiry: endorsement_from(ctx, "expiry_date", "expiry_note"),
        stamp_duty_charge: ctx.param("stamp_duty_charge").map(str::to_string),
        stamp_duty_paid: matches!(ctx.param("stamp_duty_paid"), Some("true") | Some("on")),
    })
}

#[async_trait]
impl CommandHandler for AgreementsCommand {
    fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: &RequestContext) -> Result<CommandOutcome, CommandError> {
        if ctx.is_write() {
            self.write(ctx).await
        } else {
            self.read(ctx).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use col_agreements::{Agreement, Contractor};
    use col_auth::{Principal, Role};
    use col_core::{RecipientGroupId, UserId};
    use col_storage::InMemoryGateway;

    fn grp(id: i64) -> RecipientGroupId {
        RecipientGroupId::new(id)
    }

    fn principal() -> Principal {
        Principal::new(UserId::new(1), "mrossi", Role::user(), vec![grp(1)])
    }

    fn ctx(write: bool, pairs: &[(&str, &str)]) -> RequestContext {
        let params = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RequestContext::new(write, params, "", None, principal())
    }

    fn gateway() -> Arc<dyn StorageGateway> {
        Arc::new(
            InMemoryGateway::new()
                .with_agreement(
                    Agreement::new(AgreementId::new(42), "Radiology services").unwrap(),
                    &[grp(1)],
                )
                .with_contractor(Contractor::new(ContractorId::new(7), "Acme Srl").unwrap())
                .with_contractor(Contractor::new(ContractorId::new(8), "Globex SpA").unwrap()),
        )
    }

    fn command() -> AgreementsCommand {
        let descriptor =
            CommandDescriptor::new("conv", "AgreementsCommand", "landing", "Agreements", 10);
        AgreementsCommand::new(descriptor, gateway()).unwrap()
    }

    #[tokio::test]
    async fn default_read_lists_agreements_on_landing() {
        let outcome = command().execute(&ctx(false, &[])).await.unwrap();
        assert_eq!(outcome.view, "landing");
        assert_eq!(outcome.agreements.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn read_with_id_shows_detail() {
        let outcome = command()
            .execute(&ctx(false, &[("id", "42")]))
            .await
            .unwrap();
        assert_eq!(outcome.view, "agreement");
        assert_eq!(outcome.agreement.unwrap().title, "Radiology services");
    }

    #[tokio::test]
    async fn missing_agreement_is_a_business_error() {
        let err = command()
            .execute(&ctx(false, &[("id", "99")]))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Storage(_)));
    }

    #[tokio::test]
    async fn write_update_contractor_routes_to_assignment_view() {
        let outcome = command()
            .execute(&ctx(
                true,
                &[
                    ("op", "upd"),
                    ("obj", "contractor"),
                    ("id", "42"),
                    ("contractors", "7"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(outcome.view, "contractorAssignForm");
        let assigned = outcome.contractors.unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].name, "Acme Srl");
    }

    #[tokio::test]
    async fn write_insert_contractor_redirects_to_detail() {
        let outcome = command()
            .execute(&ctx(
                true,
                &[
                    ("op", "ins"),
                    ("obj", "contractor"),
                    ("id", "42"),
                    ("contractors", "7,8"),
                ],
            ))
            .await
            .unwrap();
        assert!(outcome.is_redirect());
        assert_eq!(outcome.redirect.as_deref(), Some("ent=conv&op=sel&id=42"));
    }

    #[tokio::test]
    async fn assignment_form_offers_only_unassigned_contractors() {
        let cmd = command();
        cmd.execute(&ctx(
            true,
            &[("op", "ins"), ("obj", "contractor"), ("id", "42"), ("contractors", "7")],
        ))
        .await
        .unwrap();

        let outcome = cmd
            .execute(&ctx(
                false,
                &[("op", "ins"), ("obj", "contractor"), ("id", "42")],
            ))
            .await
            .unwrap();
        assert_eq!(outcome.view, "contractorAssignForm");
        let offered = outcome.contractors.unwrap();
        assert_eq!(offered.len(), 1);
        assert_eq!(offered[0].name, "Globex SpA");
    }

    #[tokio::test]
    async fn write_update_persists_edit_and_shows_detail() {
        let outcome = command()
            .execute(&ctx(
                true,
                &[
                    ("op", "upd"),
                    ("id", "42"),
                    ("title", "Radiology services (renewed)"),
                    ("expiry_date", "2027-12-31"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(outcome.view, "agreement");
        let updated = outcome.agreement.unwrap();
        assert_eq!(updated.title, "Radiology services (renewed)");
        assert_eq!(
            updated.expiry.unwrap().date,
            NaiveDate::from_ymd_opt(2027, 12, 31).unwrap()
        );
    }

    #[tokio::test]
    async fn update_without_title_is_rejected() {
        let err = command()
            .execute(&ctx(true, &[("op", "upd"), ("id", "42")]))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Domain(DomainError::MissingAttribute(_))));
    }

    #[tokio::test]
    async fn delete_writes_fall_through_to_landing() {
        let outcome = command()
            .execute(&ctx(true, &[("op", "del"), ("id", "42")]))
            .await
            .unwrap();
        assert_eq!(outcome.view, "landing");
        assert!(outcome.agreements.is_some());
    }

    #[tokio::test]
    async fn unknown_op_falls_through_to_landing() {
        let outcome = command()
            .execute(&ctx(false, &[("op", "zap")]))
            .await
            .unwrap();
        assert_eq!(outcome.view, "landing");
        assert!(outcome.agreements.is_some());
    }

    #[tokio::test]
    async fn contractor_register_and_card() {
        let cmd = command();
        let register = cmd
            .execute(&ctx(false, &[("obj", "contractor")]))
            .await
            .unwrap();
        assert_eq!(register.view, "contractorsRegister");
        assert_eq!(register.contractors.unwrap().len(), 2);

        let card = cmd
            .execute(&ctx(false, &[("obj", "contractor"), ("id", "7")]))
            .await
            .unwrap();
        assert_eq!(card.view, "contractorCard");
        assert_eq!(card.contractor.unwrap().name, "Acme Srl");
    }
}
