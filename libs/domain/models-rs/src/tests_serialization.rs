// [libs/domain/models-rs/src/tests_serialization.rs]
/**
 * =================================================================
 * APARATO: DOMAIN SERIALIZATION TEST (INTEGRATION LEVEL)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * RESPONSABILIDAD: CERTIFICACIÓN DE PARIDAD JSON DE LOS CONTRATOS
 *
 * # Mathematical Proof (Wire Parity):
 * El planning store y el Ledger intercambian los contratos en texto;
 * cualquier deriva en los discriminadores Serde (kind, status) rompe
 * la ingesta idempotente. El test certifica el roundtrip completo:
 * Struct -> JSON -> Struct, y los tags exactos del protocolo.
 * =================================================================
 */
