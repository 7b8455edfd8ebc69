use caseflow_domain::{CaseRequest, KanbanBoard, KanbanColumn, StatusGroup};

use crate::resolver::current_group;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardLane {
    pub column: KanbanColumn,
    pub rows: Vec<CaseRequest>,
}

pub fn default_label(group: StatusGroup) -> &'static str {
    match group {
        StatusGroup::New => "New",
        StatusGroup::InProgress => "In progress",
        StatusGroup::Waiting => "Waiting",
        StatusGroup::Done => "Done",
    }
}

/// Splits board rows into lanes following the server's column order. When the
/// server sent no columns the four standard groups are used.
pub fn bucket_rows(board: &KanbanBoard) -> Vec<BoardLane> {
    let columns = if board.columns.is_empty() {
        StatusGroup::ALL
            .iter()
            .map(|group| KanbanColumn {
                group: *group,
                label: default_label(*group).to_owned(),
            })
            .collect()
    } else {
        board.columns.clone()
    };

    let mut lanes = columns
        .into_iter()
        .map(|column| BoardLane {
            column,
            rows: Vec::new(),
        })
        .collect::<Vec<_>>();

    for row in &board.rows {
        let group = current_group(row).group;
        if let Some(lane) = lanes.iter_mut().find(|lane| lane.column.group == group) {
            lane.rows.push(row.clone());
        }
    }
    lanes
}
