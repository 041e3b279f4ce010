//! Contestation (recurso de glosa) letters for underpaid or unpaid procedures.

use crate::comparison::{ComparisonResult, PaymentStatus};
use crate::money::format_brl;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why the payer is assumed to have denied or reduced a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlosaReason {
    ValorDivergente,
    DocumentoAusente,
    CodigoIncorreto,
    ProcedimentoNaoCoberto,
    PacoteServico,
    NaoJustificado,
    Outro,
}

impl GlosaReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlosaReason::ValorDivergente => "valor_divergente",
            GlosaReason::DocumentoAusente => "documento_ausente",
            GlosaReason::CodigoIncorreto => "codigo_incorreto",
            GlosaReason::ProcedimentoNaoCoberto => "procedimento_nao_coberto",
            GlosaReason::PacoteServico => "pacote_servico",
            GlosaReason::NaoJustificado => "nao_justificado",
            GlosaReason::Outro => "outro",
        }
    }

    /// Standard technical justification paragraph for this reason.
    pub fn default_justification(&self) -> &'static str {
        match self {
            GlosaReason::ValorDivergente => {
                "O valor pago está em desacordo com a tabela de referência CBHPM, utilizada como \
                 base para precificação dos procedimentos médicos conforme contrato vigente. O \
                 valor correto deve incluir o porte do procedimento, custo operacional e porte \
                 anestésico quando aplicável."
            }
            GlosaReason::DocumentoAusente => {
                "Todos os documentos necessários para comprovação do procedimento foram \
                 devidamente enviados no faturamento original, incluindo relatório médico, folha \
                 de sala, descrição cirúrgica e ficha anestésica. Anexo novamente nesta \
                 contestação todos os documentos pertinentes."
            }
            GlosaReason::CodigoIncorreto => {
                "O código utilizado está correto e em conformidade com a tabela CBHPM. O \
                 procedimento realizado corresponde exatamente à descrição do código informado, \
                 não havendo justificativa para alteração ou substituição do mesmo."
            }
            GlosaReason::ProcedimentoNaoCoberto => {
                "O procedimento em questão está coberto pelo contrato vigente e pela \
                 regulamentação da ANS para o plano do beneficiário. Não há exclusão contratual ou \
                 legal que justifique a não cobertura do procedimento realizado, que possui \
                 indicação técnica comprovada."
            }
            GlosaReason::PacoteServico => {
                "O procedimento contestado não está incluído em nenhum pacote de serviços. Trata-se \
                 de procedimento distinto, com código específico na tabela CBHPM, devendo ser pago \
                 separadamente conforme valores de referência estabelecidos."
            }
            GlosaReason::NaoJustificado => {
                "A glosa/pagamento inferior ao devido foi realizada sem qualquer justificativa, \
                 contrariando o Art. 8º da Lei 13.003/2014, que determina que a operadora deve \
                 informar ao prestador o motivo da glosa de forma clara e inequívoca."
            }
            GlosaReason::Outro => {
                "O procedimento foi realizado conforme indicação médica, em conformidade com as \
                 melhores práticas e seguindo os protocolos técnicos aplicáveis. Não há \
                 justificativa técnica ou legal para a glosa/pagamento inferior ao devido."
            }
        }
    }
}

impl std::fmt::Display for GlosaReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guess the denial reason from the paid amount and the payer's stated reason, if any.
pub fn detect_reason(paid_amount: Decimal, reason_given: Option<&str>) -> GlosaReason {
    if paid_amount.is_zero() {
        return GlosaReason::ProcedimentoNaoCoberto;
    }

    let Some(reason) = reason_given
        .map(|r| r.trim().to_lowercase())
        .filter(|r| !r.is_empty())
    else {
        return GlosaReason::NaoJustificado;
    };

    if reason.contains("document") {
        GlosaReason::DocumentoAusente
    } else if reason.contains("pacote") || reason.contains("bundle") {
        GlosaReason::PacoteServico
    } else if reason.contains("cod") {
        GlosaReason::CodigoIncorreto
    } else {
        GlosaReason::ValorDivergente
    }
}

/// Only underpaid and unpaid lines with a known reference value are worth contesting.
pub fn is_contestable(result: &ComparisonResult) -> bool {
    result.reference_found && matches!(result.status, PaymentStatus::Below | PaymentStatus::NotPaid)
}

/// Physician signing the letter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signatory {
    pub name: String,
    pub crm: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contestation {
    pub reason: GlosaReason,
    pub text: String,
}

/// Render a contestation letter for a comparison result.
///
/// Returns `None` when the result is not contestable.
pub fn generate_contestation(
    result: &ComparisonResult,
    reason_given: Option<&str>,
    date: NaiveDate,
    signatory: Option<&Signatory>,
) -> Option<Contestation> {
    if !is_contestable(result) {
        return None;
    }

    let reason = detect_reason(result.paid_amount, reason_given);
    let direction = if result.paid_amount < result.reference_value {
        "valor inferior ao previsto"
    } else {
        "valor superior ao previsto"
    };
    let (name, crm) = signatory
        .map(|s| (s.name.as_str(), s.crm.as_str()))
        .unwrap_or_default();

    let text = format!(
        "CONTESTAÇÃO DE GLOSA - {date}\n\
         \n\
         Código do procedimento: {code}\n\
         Descrição: {description}\n\
         Papel profissional: {role}\n\
         Guia: {guide}\n\
         \n\
         Prezados Senhores,\n\
         \n\
         Venho por meio desta contestar a glosa/pagamento inadequado do procedimento acima \
         identificado pelos motivos abaixo:\n\
         \n\
         1. VALOR DE REFERÊNCIA CBHPM:\n   \
         Valor estabelecido: {reference}\n   \
         Valor pago: {paid}\n   \
         Diferença: {difference} ({direction})\n\
         \n\
         2. JUSTIFICATIVA TÉCNICA:\n\
         {justification}\n\
         \n\
         3. FUNDAMENTOS LEGAIS:\n   \
         - Resolução Normativa ANS nº 305/2012, que estabelece o padrão obrigatório para Troca de \
         Informações na Saúde Suplementar;\n   \
         - Lei nº 13.003/2014, que dispõe sobre os contratos entre operadoras e prestadores de \
         serviço;\n   \
         - Classificação Brasileira Hierarquizada de Procedimentos Médicos (CBHPM), utilizada como \
         referência contratual.\n\
         \n\
         Considerando o exposto, solicito a revisão do pagamento e o complemento do valor devido \
         conforme tabela CBHPM, bem como a reanálise do procedimento em questão.\n\
         \n\
         Atenciosamente,\n\
         \n\
         ___________________________\n\
         Dr(a). {name}\n\
         CRM: {crm}\n",
        date = date.format("%d/%m/%Y"),
        code = result.code,
        description = result.description,
        role = result.role,
        guide = result.guide_number,
        reference = format_brl(result.reference_value),
        paid = format_brl(result.paid_amount),
        difference = format_brl(result.difference),
        justification = reason.default_justification(),
    );

    tracing::debug!(code = %result.code, reason = %reason, "contestation generated");
    Some(Contestation { reason, text })
}
