use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Debug, Display},
};

use petgraph::{
    graph::EdgeIndex,
    graph::NodeIndex,
    prelude::DiGraph,
    visit::{EdgeRef, IntoNodeReferences},
    Direction::Outgoing,
    Graph,
};

pub type StateId = NodeIndex;

#[derive(Debug)]
pub enum AutomatonState<StateType: Debug> {
    Accepting(StateType),
    Intermediate(usize),
}

pub enum NfaEdge<TransitionType> {
    Epsilon,
    Transition(TransitionType),
}

impl<TransitionType: Debug> Debug for NfaEdge<TransitionType> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Epsilon => write!(f, "ε"),
            Self::Transition(t) => write!(f, "{:?}", t),
        }
    }
}

impl<TransitionType: Display> Display for NfaEdge<TransitionType> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Epsilon => write!(f, "ε"),
            Self::Transition(t) => write!(f, "{}", t),
        }
    }
}

/// ε-NFA over an abstract transition symbol (the lexer instantiates it with
/// alphabet cell indices).
#[derive(Debug)]
pub struct Nfa<StateType: Debug, TransitionType: Debug> {
    graph: Graph<AutomatonState<StateType>, NfaEdge<TransitionType>>,
    intermediate_counter: usize,
}

impl<StateType: Debug, TransitionType: Debug> Default for Nfa<StateType, TransitionType> {
    fn default() -> Self {
        Self::new()
    }
}

impl<StateType: Debug, TransitionType: Debug> Nfa<StateType, TransitionType> {
    pub fn new() -> Self {
        Nfa {
            graph: DiGraph::new(),
            intermediate_counter: 0,
        }
    }

    pub fn graph(&self) -> &Graph<AutomatonState<StateType>, NfaEdge<TransitionType>> {
        &self.graph
    }

    pub fn add_intermediate_state(&mut self) -> StateId {
        let added_node = self
            .graph
            .add_node(AutomatonState::Intermediate(self.intermediate_counter));
        self.intermediate_counter += 1;
        added_node
    }

    pub fn add_accepting_state(&mut self, state: StateType) -> StateId {
        self.graph.add_node(AutomatonState::Accepting(state))
    }

    pub fn add_epsilon_transition(&mut self, start: StateId, end: StateId) -> EdgeIndex {
        self.graph.add_edge(start, end, NfaEdge::Epsilon)
    }

    pub fn add_transition(
        &mut self,
        start: StateId,
        end: StateId,
        transition: TransitionType,
    ) -> EdgeIndex {
        self.graph
            .add_edge(start, end, NfaEdge::Transition(transition))
    }
}

/// DFA produced by subset construction. An accepting state carries every
/// accepting payload of its powerset, in ascending NFA insertion order, so
/// priority resolution downstream is stable.
pub struct Dfa<StateType: Debug, TransitionType: Debug> {
    graph: Graph<AutomatonState<StateType>, TransitionType>,
    start: StateId,
}

impl<StateType: Debug, TransitionType: Debug> Dfa<StateType, TransitionType> {
    pub fn start(&self) -> StateId {
        self.start
    }

    pub fn state_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn states(&self) -> impl Iterator<Item = (StateId, &AutomatonState<StateType>)> {
        self.graph.node_references()
    }

    pub fn state(&self, id: StateId) -> &AutomatonState<StateType> {
        self.graph.node_weight(id).unwrap()
    }

    pub fn transitions_from(
        &self,
        node: StateId,
    ) -> impl Iterator<Item = (&TransitionType, StateId)> {
        self.graph
            .edges_directed(node, Outgoing)
            .map(|eref| (eref.weight(), eref.target()))
    }
}

impl<StateType: Clone + Debug, TransitionType: Debug + Clone + Ord> Nfa<StateType, TransitionType> {
    fn epsilon_closure(&self, start_nodes: impl IntoIterator<Item = StateId>) -> BTreeSet<usize> {
        let mut closure = BTreeSet::new();
        let mut stack: Vec<StateId> = start_nodes.into_iter().collect();
        while let Some(node) = stack.pop() {
            if !closure.insert(node.index()) {
                continue;
            }
            for edge in self.graph.edges_directed(node, Outgoing) {
                if let NfaEdge::Epsilon = edge.weight() {
                    if !closure.contains(&edge.target().index()) {
                        stack.push(edge.target());
                    }
                }
            }
        }
        closure
    }

    /// Powerset construction. Powersets are ordered sets of NFA state ids
    /// and the worklist is processed in insertion order, so the result is
    /// identical across runs.
    pub fn powerset_construction(
        &self,
        entrypoint: StateId,
    ) -> Dfa<Vec<StateType>, TransitionType> {
        let mut dfa: Graph<AutomatonState<Vec<StateType>>, TransitionType> = DiGraph::new();
        let mut visited: BTreeMap<BTreeSet<usize>, StateId> = BTreeMap::new();
        let mut worklist: Vec<BTreeSet<usize>> = Vec::new();
        let mut tmp_id = 0usize;

        let add_state = |dfa: &mut Graph<AutomatonState<Vec<StateType>>, TransitionType>,
                             visited: &mut BTreeMap<BTreeSet<usize>, StateId>,
                             worklist: &mut Vec<BTreeSet<usize>>,
                             tmp_id: &mut usize,
                             powerset: BTreeSet<usize>|
         -> StateId {
            if let Some(id) = visited.get(&powerset) {
                return *id;
            }
            let mut accepts = Vec::new();
            for nfa_index in &powerset {
                if let Some(AutomatonState::Accepting(s)) =
                    self.graph.node_weight(NodeIndex::new(*nfa_index))
                {
                    accepts.push(s.clone());
                }
            }
            let node = if accepts.is_empty() {
                let id = *tmp_id;
                *tmp_id += 1;
                dfa.add_node(AutomatonState::Intermediate(id))
            } else {
                dfa.add_node(AutomatonState::Accepting(accepts))
            };
            visited.insert(powerset.clone(), node);
            worklist.push(powerset);
            node
        };

        let start_set = self.epsilon_closure([entrypoint]);
        let start = add_state(&mut dfa, &mut visited, &mut worklist, &mut tmp_id, start_set);

        let mut cursor = 0;
        while cursor < worklist.len() {
            let powerset = worklist[cursor].clone();
            cursor += 1;
            let from = visited[&powerset];

            let mut targets: BTreeMap<TransitionType, Vec<StateId>> = BTreeMap::new();
            for nfa_index in &powerset {
                for edge in self
                    .graph
                    .edges_directed(NodeIndex::new(*nfa_index), Outgoing)
                {
                    if let NfaEdge::Transition(t) = edge.weight() {
                        targets.entry(t.clone()).or_default().push(edge.target());
                    }
                }
            }
            for (t, nodes) in targets {
                let closure = self.epsilon_closure(nodes);
                let to = add_state(&mut dfa, &mut visited, &mut worklist, &mut tmp_id, closure);
                dfa.add_edge(from, to, t);
            }
        }

        Dfa { graph: dfa, start }
    }
}
