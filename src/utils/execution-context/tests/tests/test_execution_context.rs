// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use execution_context::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

fn tenant_context() -> ExecutionContext {
    ExecutionContext::new(
        TenantId::new_random(),
        CorrelationId::new_random(),
        vec![Claim::new("role", "reader", "string")],
    )
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_no_ambient_context_outside_scope() {
    assert_eq!(ExecutionContext::current(), None);
    assert!(ExecutionContext::current_or_system().tenant.is_system());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_scope_installs_and_nests_context() {
    let outer = tenant_context();
    let inner = outer.for_tenant(TenantId::new_random());

    let (seen_outer, seen_inner, seen_after) = outer
        .clone()
        .scope(async {
            let seen_outer = ExecutionContext::current();
            let seen_inner = inner.clone().scope(async { ExecutionContext::current() }).await;
            (seen_outer, seen_inner, ExecutionContext::current())
        })
        .await;

    assert_eq!(seen_outer.as_ref(), Some(&outer));
    assert_eq!(seen_inner.as_ref(), Some(&inner));
    assert_eq!(seen_after.as_ref(), Some(&outer));
    assert_eq!(ExecutionContext::current(), None);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_derived_contexts_keep_other_fields() {
    let ctx = tenant_context();

    let correlation = CorrelationId::new_random();
    let derived = ctx.with_correlation(correlation);
    assert_eq!(derived.tenant, ctx.tenant);
    assert_eq!(derived.claims, ctx.claims);
    assert_eq!(derived.correlation_id, correlation);

    let json = serde_json::to_value(&ctx).unwrap();
    assert_eq!(
        json["tenant"],
        serde_json::Value::String(ctx.tenant.to_string())
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
