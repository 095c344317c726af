//! Arena view of a program's nested action lists

use crate::models::{Action, ActionPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node<'a> {
    action: &'a Action,
    path: ActionPath,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Flattened tree over borrowed actions. Node ids are assigned in pre-order.
#[derive(Debug)]
pub struct ActionTree<'a> {
    nodes: Vec<Node<'a>>,
    roots: Vec<NodeId>,
}

impl<'a> ActionTree<'a> {
    pub fn build(actions: &'a [Action]) -> Self {
        let mut tree = ActionTree {
            nodes: Vec::new(),
            roots: Vec::new(),
        };
        let roots = actions
            .iter()
            .enumerate()
            .map(|(i, action)| tree.insert(action, ActionPath::root(i), None))
            .collect();
        tree.roots = roots;
        tree
    }

    fn insert(&mut self, action: &'a Action, path: ActionPath, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            action,
            path: path.clone(),
            parent,
            children: Vec::new(),
        });

        let children: Vec<NodeId> = action
            .children()
            .iter()
            .enumerate()
            .map(|(i, child)| self.insert(child, path.child(i), Some(id)))
            .collect();
        self.nodes[id.0].children = children;
        id
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn action(&self, id: NodeId) -> &'a Action {
        self.nodes[id.0].action
    }

    pub fn path(&self, id: NodeId) -> &ActionPath {
        &self.nodes[id.0].path
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node at `path`, if the path exists.
    pub fn find(&self, path: &ActionPath) -> Option<NodeId> {
        let (first, rest) = path.0.split_first()?;
        let mut id = *self.roots.get(*first)?;
        for &index in rest {
            id = *self.children(id).get(index)?;
        }
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageCheck, Region};

    fn branch(children: Vec<Action>) -> Action {
        Action::ImgCheck(ImageCheck {
            reference_image: "ref.png".into(),
            region: Region::new(0, 0, 10, 10),
            threshold: 0.9,
            match_actions: children,
            wait_until_found: false,
            poll_interval: None,
            timeout: 0.0,
        })
    }

    #[test]
    fn test_paths_and_parents() {
        let actions = vec![
            Action::click(1, 1),
            branch(vec![Action::Copy, branch(vec![Action::ClickFound])]),
            Action::Paste,
        ];
        let tree = ActionTree::build(&actions);

        assert_eq!(tree.len(), 6);
        assert_eq!(tree.roots().len(), 3);

        let inner = tree.find(&ActionPath(vec![1, 1, 0])).unwrap();
        assert_eq!(tree.action(inner), &Action::ClickFound);
        assert_eq!(tree.path(inner).to_string(), "2.2.1");

        let parent = tree.parent(inner).unwrap();
        assert_eq!(tree.path(parent).to_string(), "2.2");
        assert!(tree.parent(tree.roots()[0]).is_none());
        assert!(tree.find(&ActionPath(vec![0, 0])).is_none());
    }
}
